//! XML Tree Module
//!
//! quick-xmlのイベントを軽量な要素ツリーに組み立て、書き換え後に
//! 再びイベント列として書き出すモジュール。
//!
//! 未知の要素・属性・名前空間宣言はイベント単位でそのまま保持するため、
//! 書き換え対象以外の部分は元のXMLと同じ内容で出力されます。

use quick_xml::escape::unescape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::OfficeFillError;

/// ツリーのノード
#[derive(Debug, Clone)]
pub(crate) enum XmlNode {
    /// 要素
    Element(XmlElement),
    /// テキスト
    Text(BytesText<'static>),
    /// コメント・CDATA・処理命令など、内容を解釈しないイベント
    Other(Event<'static>),
}

/// XML要素
#[derive(Debug, Clone)]
pub(crate) struct XmlElement {
    start: BytesStart<'static>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// 新しい要素を生成（名前には名前空間プレフィックスを含めてよい）
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
        }
    }

    /// 修飾名（例: "w:p"）
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.start.name().as_ref()).into_owned()
    }

    /// 名前空間プレフィックス（例: "w:p" -> "w:"、プレフィックスなしの場合は空文字列）
    pub fn prefix(&self) -> String {
        let name = self.name();
        match name.split_once(':') {
            Some((prefix, _)) => format!("{}:", prefix),
            None => String::new(),
        }
    }

    /// ローカル名が一致するかを判定
    pub fn is(&self, local: &str) -> bool {
        self.start.local_name().as_ref() == local.as_bytes()
    }

    /// 属性値を取得（キーは修飾名で完全一致）
    pub fn attr(&self, key: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.as_ref() == key.as_bytes())
            .and_then(|attr| unescaped_value(&attr))
    }

    /// 属性値をローカル名で取得（例: "r:id"を"id"で検索）
    pub fn attr_local(&self, local: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|attr| attr.key.local_name().as_ref() == local.as_bytes())
            .and_then(|attr| unescaped_value(&attr))
    }

    /// 属性を設定（既存の同名属性は置き換え、属性の並び順は保持）
    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.rebuild_attrs(key, Some(value));
    }

    /// 属性を削除
    pub fn remove_attr(&mut self, key: &str) {
        self.rebuild_attrs(key, None);
    }

    fn rebuild_attrs(&mut self, key: &str, value: Option<&str>) {
        let existing: Vec<(Vec<u8>, Vec<u8>)> = self
            .start
            .attributes()
            .flatten()
            .map(|attr| (attr.key.as_ref().to_vec(), attr.value.into_owned()))
            .collect();

        let mut replaced = false;
        self.start.clear_attributes();
        for (k, v) in existing {
            if k == key.as_bytes() {
                if let Some(value) = value {
                    if !replaced {
                        self.start.push_attribute((key, value));
                        replaced = true;
                    }
                }
                continue;
            }
            // 既存値はエスケープ済みのため、そのまま書き戻す
            self.start.push_attribute(Attribute {
                key: quick_xml::name::QName(&k),
                value: std::borrow::Cow::Borrowed(&v),
            });
        }
        if let (Some(value), false) = (value, replaced) {
            self.start.push_attribute((key, value));
        }
    }

    /// ローカル名が一致する子要素を列挙
    pub fn child_elements<'a, 'b>(
        &'a self,
        local: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(e) if e.is(local) => Some(e),
            _ => None,
        })
    }

    /// ローカル名が一致する最初の子要素
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(e) if e.is(local) => Some(e),
            _ => None,
        })
    }

    /// ローカル名が一致する最初の子要素（可変）
    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) if e.is(local) => Some(e),
            _ => None,
        })
    }

    /// 子要素（要素ノードのみ）の可変参照を列挙
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// 子孫要素のうち、ローカル名が一致する最初の要素（深さ優先）
    #[cfg(test)]
    pub fn descendant_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        for node in self.children.iter_mut() {
            if let XmlNode::Element(e) = node {
                if e.is(local) {
                    return Some(e);
                }
                if let Some(found) = e.descendant_mut(local) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// 要素内のテキストを連結して取得（エスケープ解除済み）
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) => {
                    if let Ok(s) = t.unescape() {
                        out.push_str(&s);
                    }
                }
                XmlNode::Other(Event::CData(c)) => {
                    out.push_str(&String::from_utf8_lossy(c));
                }
                XmlNode::Element(e) => out.push_str(&e.text()),
                _ => {}
            }
        }
        out
    }

    /// 子ノードをテキスト1つに置き換える
    ///
    /// XML 1.0で使用できない制御文字は取り除かれます。
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        let text: String = text.chars().filter(|&c| !is_forbidden_xml_char(c)).collect();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(BytesText::new(&text).into_owned()));
        }
    }

    /// 子要素を末尾に追加
    pub fn push(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), OfficeFillError> {
        if self.children.is_empty() {
            writer.write_event(Event::Empty(self.start.borrow()))?;
            return Ok(());
        }

        writer.write_event(Event::Start(self.start.borrow()))?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_into(writer)?,
                XmlNode::Text(t) => writer.write_event(Event::Text(t.clone()))?,
                XmlNode::Other(event) => writer.write_event(event)?,
            }
        }
        let name = self.name();
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        Ok(())
    }
}

/// XMLパーツ全体（宣言・ルート要素・前後のノード）
#[derive(Debug, Clone)]
pub(crate) struct XmlDocument {
    prolog: Vec<XmlNode>,
    pub root: XmlElement,
    epilog: Vec<XmlNode>,
}

impl XmlDocument {
    /// XMLバイト列を解析してツリーを構築
    ///
    /// 空白テキストも保持します（`xml:space="preserve"`の内容を壊さないため）。
    pub fn parse(bytes: &[u8]) -> Result<Self, OfficeFillError> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);

        let mut buf = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match event {
                Event::Start(e) => {
                    stack.push(XmlElement {
                        start: e.into_owned(),
                        children: Vec::new(),
                    });
                }
                Event::Empty(e) => {
                    let element = XmlElement {
                        start: e.into_owned(),
                        children: Vec::new(),
                    };
                    attach(&mut stack, &mut root, XmlNode::Element(element))?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        OfficeFillError::Xml("Unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, XmlNode::Element(element))?;
                }
                Event::Text(t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(t.into_owned()));
                    }
                    // ルート外の空白は破棄し、書き出し時に改行を補う
                }
                Event::Eof => break,
                other => {
                    let node = XmlNode::Other(other.into_owned());
                    match (stack.last_mut(), root.is_some()) {
                        (Some(parent), _) => parent.children.push(node),
                        (None, false) => prolog.push(node),
                        (None, true) => epilog.push(node),
                    }
                }
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(OfficeFillError::Xml("Unclosed element at end of document".to_string()));
        }

        let root =
            root.ok_or_else(|| OfficeFillError::Xml("Document has no root element".to_string()))?;

        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// ツリーをXMLバイト列に書き出す
    pub fn to_bytes(&self) -> Result<Vec<u8>, OfficeFillError> {
        let mut writer = Writer::new(Vec::new());

        for node in &self.prolog {
            if let XmlNode::Other(event) = node {
                writer.write_event(event)?;
                if matches!(event, Event::Decl(_)) {
                    writer.write_event(Event::Text(BytesText::from_escaped("\r\n")))?;
                }
            }
        }

        self.root.write_into(&mut writer)?;

        for node in &self.epilog {
            if let XmlNode::Other(event) = node {
                writer.write_event(event)?;
            }
        }

        Ok(writer.into_inner())
    }
}

/// XML 1.0の文書に書き込めない文字か
///
/// タブ・改行・復帰を除くC0制御文字と、`U+FFFE`・`U+FFFF`が該当します。
pub(crate) fn is_forbidden_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
    )
}

/// 属性値のエスケープを解除して取得
fn unescaped_value(attr: &Attribute<'_>) -> Option<String> {
    let raw = String::from_utf8_lossy(&attr.value);
    unescape(&raw).ok().map(|value| value.into_owned())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    node: XmlNode,
) -> Result<(), OfficeFillError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => match node {
            XmlNode::Element(element) if root.is_none() => {
                *root = Some(element);
                Ok(())
            }
            _ => Err(OfficeFillError::Xml("Multiple root elements".to_string())),
        },
    }
}
