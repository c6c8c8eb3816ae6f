//! 消息模板替换
//!
//! 邮件正文支持 `{{key}}` 占位符，值来自通知的元数据。
//! 替换为单遍扫描、非递归：替换出来的值里再出现占位符也不会
//! 被二次处理，元数据中没有对应键的占位符原样保留。

use crate::models::Metadata;

/// 对模板做单遍占位符替换
pub fn interpolate(template: &str, metadata: &Metadata) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match metadata.get(key) {
                    Some(value) => out.push_str(&value_to_string(value)),
                    None => {
                        // 未匹配的占位符原样保留
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // 没有闭合的 "}}"，余下部分原样输出
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// 将 JSON 值渲染为文本
///
/// 字符串直接取值，数值等其他类型用 JSON 表示，避免渲染 panic。
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
