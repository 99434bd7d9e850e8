mod batch;
mod common;
mod encoder;
