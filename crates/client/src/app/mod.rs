mod bootstrap;
mod loop_runner;
mod manifest;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
