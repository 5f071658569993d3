// Offline pipelines — feed logged actions through the scoring engine.

pub mod replay;
