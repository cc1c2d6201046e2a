pub mod clock;
pub mod dir;
pub mod logging;
pub mod percentage;
pub mod runtime;
pub mod time;

#[cfg(test)]
pub mod test_clock;
