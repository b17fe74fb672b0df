use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use crate::error::Result;

/// Declaration written in front of every rewritten part.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Element name `local` carrying the same namespace prefix as `sibling`.
pub fn prefixed_name(sibling: &BytesStart, local: &str) -> String {
    match sibling.name().prefix() {
        Some(prefix) => format!("{}:{}", String::from_utf8_lossy(prefix.as_ref()), local),
        None => local.to_string(),
    }
}

/// Write `<name xml:space="preserve">text</name>`.
pub fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if needs_preserve(text) {
        start.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Leading or trailing whitespace is only kept by consumers when the element
/// says `xml:space="preserve"`.
pub fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// Append the character data of a text or CDATA event to `out`.
pub fn push_text(event: &Event<'_>, out: &mut String) -> Result<()> {
    match event {
        Event::Text(t) => out.push_str(&t.unescape()?),
        Event::CData(c) => out.push_str(&String::from_utf8_lossy(c)),
        _ => {}
    }
    Ok(())
}
