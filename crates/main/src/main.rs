use folio::Error;
use folio::start;

fn main() -> Result<(), Error> {
	dotenv::dotenv().ok();
	env_logger::builder()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.init();
	start(std::env::args_os().nth(1).map(Into::into))?;
	Ok(())
}
