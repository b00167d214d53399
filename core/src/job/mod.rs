pub mod preview_job;
