pub mod batches;
pub mod games;
pub mod health;
pub mod jobs;
