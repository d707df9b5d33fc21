//! 与标记语言库无关的最小文档树。
//!
//! # 设计动机（Why）
//! - 加载器只需要“元素名 + 属性 + 子元素”三样东西；把第三方节点句柄隔离在适配层之后，
//!   加载逻辑可以直接用手工构造的树做单元测试。
//!
//! # 契约说明（What）
//! - 属性按名字存入有序映射，重复属性以后出现者为准；
//! - 文本节点、注释与处理指令不进入 AST。

use std::collections::BTreeMap;

/// 文档元素。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Element {
    /// 元素本地名（不含命名空间前缀）。
    pub name: String,
    /// 属性。
    pub attrs: BTreeMap<String, String>,
    /// 子元素，保持文档顺序。
    pub children: Vec<Element>,
}

impl Element {
    /// 无属性、无子元素的元素。
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// 追加属性，构建器风格。
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// 追加子元素，构建器风格。
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// 读取属性。
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// 按名字筛选直接子元素。
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// 第一个同名直接子元素。
    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }
}
