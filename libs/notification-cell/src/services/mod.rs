pub mod channels;
pub mod dispatch;
pub mod tokens;
