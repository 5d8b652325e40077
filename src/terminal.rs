mod bullet_points;
mod prompt;

pub use bullet_points::{BufferLineWriter, BulletPointPrinter, LineWriter, StdoutLineWriter};
pub use prompt::prompt;
