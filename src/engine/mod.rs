pub mod ingest;
pub mod lifecycle;
