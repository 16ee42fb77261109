#[allow(
    unused_imports,
    dead_code,
    clippy::all,
    unsafe_op_in_unsafe_fn,
    mismatched_lifetime_syntaxes
)]
mod records_generated;

pub use records_generated::shmheap::schema::*;
