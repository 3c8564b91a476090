pub mod finance;
pub mod incised;
pub mod kasbon;
pub mod payroll;
pub mod period;
pub mod settlement;
pub mod warehouse;
