mod common;
mod lending;
mod postgres;
mod promotion;
mod router;
