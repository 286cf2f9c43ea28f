//! File adapters for the three pipeline artifacts: the sales export, the
//! lookup workbook, and the accounting template.

mod cells;
pub mod lookup_read;
pub mod sales_csv;
pub mod template_write;
