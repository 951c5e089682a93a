//! DDP 消息
//!
//! 定义连接池使用到的 DDP 文本消息，消息类型由 `msg` 字段区分。
//!
//! ```text
//! {"msg":"connect","version":"1","support":["1","pre2","pre1","ddpproxy"]}
//! {"msg":"method","method":"login","params":[{...}],"id":"1"}
//! {"msg":"added","collection":"fruits","id":"a1","fields":{"name":"apple"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 文档字段
pub type Fields = Map<String, Value>;

/// DDP 消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "camelCase")]
pub enum Message {
    /// 客户端握手
    Connect {
        version: String,
        support: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    /// 握手成功
    Connected { session: String },
    /// 版本协商失败
    Failed { version: String },
    /// 心跳请求
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// 心跳响应
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// 远程方法调用
    Method {
        method: String,
        #[serde(default)]
        params: Vec<Value>,
        id: String,
    },
    /// 方法调用结果
    Result {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<MethodError>,
    },
    /// 方法写入已全部同步
    Updated { methods: Vec<String> },
    /// 订阅
    Sub {
        id: String,
        name: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    /// 取消订阅
    Unsub { id: String },
    /// 订阅已就绪
    Ready { subs: Vec<String> },
    /// 订阅结束或被拒绝
    Nosub {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<MethodError>,
    },
    /// 文档新增
    Added {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Fields>,
    },
    /// 文档变更
    Changed {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Fields>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cleared: Option<Vec<String>>,
    },
    /// 文档删除
    Removed { collection: String, id: String },
    /// 有序文档新增
    AddedBefore {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Fields>,
        #[serde(default)]
        before: Option<String>,
    },
    /// 有序文档移动
    MovedBefore {
        collection: String,
        id: String,
        #[serde(default)]
        before: Option<String>,
    },
    /// 服务器报告的协议错误
    Error {
        reason: String,
        #[serde(default, rename = "offendingMessage", skip_serializing_if = "Option::is_none")]
        offending_message: Option<Value>,
    },
}

impl Message {
    /// 解析文本帧
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// 序列化为文本帧
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// 推送消息所属的集合名
    pub fn collection(&self) -> Option<&str> {
        match self {
            Message::Added { collection, .. }
            | Message::Changed { collection, .. }
            | Message::Removed { collection, .. }
            | Message::AddedBefore { collection, .. }
            | Message::MovedBefore { collection, .. } => Some(collection),
            _ => None,
        }
    }
}

/// 方法或订阅返回的错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodError {
    /// 错误码，可以是数字或字符串
    #[serde(default)]
    pub error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl MethodError {
    /// 创建错误
    pub fn new(error: impl Into<Value>, reason: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            reason: Some(reason.into()),
            message: None,
            error_type: Some("Meteor.Error".to_string()),
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            return write!(f, "{}", message);
        }
        match (&self.reason, &self.error) {
            (Some(reason), Value::Null) => write!(f, "{}", reason),
            (Some(reason), code) => write!(f, "{} [{}]", reason, code),
            (None, code) => write!(f, "[{}]", code),
        }
    }
}

impl std::error::Error for MethodError {}
