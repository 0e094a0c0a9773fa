pub use drive::*;
pub use drive_id::DriveId;

mod drive;
mod drive_id;
pub mod helpers;
