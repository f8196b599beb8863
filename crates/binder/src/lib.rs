pub mod contents;
pub mod error;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod headless;
pub mod layout;
pub mod location;
pub mod managers;
pub mod mapping;
pub mod marks;
pub mod queue;
pub mod reading_system;
pub mod section;
pub mod snap;
pub mod stage;
pub mod view;
pub mod views;

pub use error::ManagerError;
pub use layout::Layout;
pub use layout::LayoutSettings;
pub use location::Location;
pub use managers::DisplayTarget;
pub use managers::ManagerEvent;
pub use managers::ManagerSettings;
pub use managers::ViewManager;
pub use managers::continuous::ContinuousSettings;
pub use managers::continuous::ContinuousViewManager;
pub use managers::default::DefaultViewManager;
pub use section::Request;
pub use section::Section;
