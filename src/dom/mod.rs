pub mod extraction;
pub mod page;
pub mod surface;

pub use page::{Page, PostSpec, VisibilityChange};
pub use surface::{Slot, Surface, SurfaceError};
