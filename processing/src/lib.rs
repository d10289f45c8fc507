pub mod context;
pub mod error;
pub mod estimator;
pub mod executable_utils;
pub mod indicators;
pub mod model;
pub mod pipeline;
pub mod processor;
pub mod scorers;
pub mod storage;
