//! sable_target_x64: x86-64 opcode selection for sable IR.

pub mod select;

#[cfg(test)]
mod tests;
