mod running_average;

pub use running_average::RunningAverage;
