mod caption;
mod classify;
mod vqa;

pub use caption::CaptioningTask;
pub use classify::ImageClassificationTask;
pub use vqa::VqaTask;
