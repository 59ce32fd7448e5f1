use chapex_core::error::ChapexError;
use serde::Serialize;

pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), ChapexError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
