//! Everything that produces tracker events: the browser ([collector]) and the clock
//! ([scheduler]).

pub mod collector;
pub mod scheduler;
