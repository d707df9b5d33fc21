//! roxmltree → [`Element`] 适配层。
//!
//! 整个 crate 只有这里接触第三方节点句柄；文本节点与注释被丢弃，元素名取本地名。

use crate::element::Element;
use crate::error::ProfileError;

/// 解析标记文本并返回根元素。
pub fn parse_document(text: &str) -> Result<Element, ProfileError> {
    let document =
        roxmltree::Document::parse(text).map_err(|err| ProfileError::Syntax(err.to_string()))?;
    Ok(convert(document.root_element()))
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    Element {
        name: node.tag_name().name().to_owned(),
        attrs: node
            .attributes()
            .map(|attr| (attr.name().to_owned(), attr.value().to_owned()))
            .collect(),
        children: node
            .children()
            .filter(roxmltree::Node::is_element)
            .map(convert)
            .collect(),
    }
}
