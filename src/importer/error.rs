// ==========================================
// 水产销售管理系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 范围: 单元格规范化失败 + 表格读取（传输层）失败
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    // ===== 单元格规范化错误 =====
    #[error("日期格式无法识别: {value}")]
    InvalidDate { value: String },

    #[error("字段 {field} 无法解析为数字: {value}")]
    InvalidNumber { field: String, value: String },

    #[error("字段 {field} 必须为整数，实际 {value}")]
    NotAnInteger { field: String, value: String },

    #[error("必填字段缺失: {field}")]
    MissingRequiredField { field: String },

    // ===== 表格读取错误 =====
    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    #[error("表格范围格式错误: {0}")]
    MalformedRange(String),

    #[error("表格服务认证失败: {0}")]
    TransportAuth(String),

    #[error("表格读取失败: {0}")]
    TransportRead(String),

    #[error("{operation} 超时（{seconds} 秒）")]
    Timeout { operation: String, seconds: u64 },
}

impl ImportError {
    /// 关联字段名（规范化错误才有）
    pub fn field(&self) -> Option<&str> {
        match self {
            ImportError::InvalidNumber { field, .. }
            | ImportError::NotAnInteger { field, .. }
            | ImportError::MissingRequiredField { field } => Some(field.as_str()),
            _ => None,
        }
    }

    /// 原始值（规范化错误才有）
    pub fn raw_value(&self) -> Option<&str> {
        match self {
            ImportError::InvalidDate { value }
            | ImportError::InvalidNumber { value, .. }
            | ImportError::NotAnInteger { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::TransportRead(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::TransportRead(format!("CSV 解析失败: {}", err))
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::TransportRead(format!("Excel 解析失败: {}", err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
