// ==========================================
// 水产销售管理系统 - 导入层
// ==========================================
// 职责: 表格读取 → 原始网格 → 解析行；单元格规范化
// 支持: 工作簿 (xlsx/xls/ods), CSV 目录
// ==========================================

// 模块声明
pub mod csv_transport;
pub mod error;
pub mod normalizer;
pub mod row_parser;
pub mod sheet_transport;
pub mod workbook_transport;

// 重导出核心类型
pub use csv_transport::CsvDirectoryTransport;
pub use error::{ImportError, ImportResult};
pub use row_parser::{parse_rows, CellGrid};
pub use sheet_transport::{
    LocalTransportFactory, SheetRange, SheetTransport, SheetTransportFactory, TransportSettings,
};
pub use workbook_transport::WorkbookTransport;
