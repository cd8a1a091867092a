// SPDX-License-Identifier: Apache-2.0

//! Streaming scanner over a Title XML document.
//!
//! The scanner never materializes the document: it walks quick-xml events
//! off a `BufRead` and yields one [`RawSection`] per section-level `DIV8`
//! element. Chapter context comes from the nearest enclosing element with
//! `TYPE="CHAPTER"`, whose `N` attribute is the chapter label.

use std::io::BufRead;

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use ecfr_atlas_core::{EtlError, EtlErrorCode, Result};
use ecfr_atlas_model::RawSection;

const SECTION_ELEMENT: &[u8] = b"DIV8";
const CHAPTER_TYPE: &[u8] = b"CHAPTER";

pub struct TitleXmlParser<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    chapter: String,
    in_section: bool,
    section_id: String,
    rev_date: Option<NaiveDate>,
    text: String,
    done: bool,
}

impl<R: BufRead> TitleXmlParser<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::new(),
            chapter: String::new(),
            in_section: false,
            section_id: String::new(),
            rev_date: None,
            text: String::new(),
            done: false,
        }
    }

    fn enter(&mut self, start: &BytesStart<'_>) {
        if attr(start, b"TYPE").is_some_and(|v| v.as_bytes() == CHAPTER_TYPE) {
            self.chapter = attr(start, b"N").unwrap_or_default();
        }
        if start.name().local_name().as_ref() == SECTION_ELEMENT {
            // Re-entry while already inside a section starts a new one.
            self.in_section = true;
            self.section_id = attr(start, b"N").unwrap_or_default();
            self.rev_date = attr(start, b"AMDDATE")
                .and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok());
            self.text.clear();
        }
    }

    fn finish_section(&mut self) -> RawSection {
        self.in_section = false;
        RawSection {
            id: std::mem::take(&mut self.section_id),
            chapter: self.chapter.clone(),
            text: std::mem::take(&mut self.text),
            rev_date: self.rev_date.take(),
        }
    }
}

impl<R: BufRead> Iterator for TitleXmlParser<R> {
    type Item = Result<RawSection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event.into_owned(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(invalid(&e.to_string())));
                }
            };
            match event {
                Event::Start(e) => self.enter(&e),
                Event::Empty(e) => {
                    self.enter(&e);
                    if e.name().local_name().as_ref() == SECTION_ELEMENT {
                        return Some(Ok(self.finish_section()));
                    }
                }
                Event::Text(t) => {
                    if self.in_section {
                        match t.unescape() {
                            Ok(chunk) => self.text.push_str(&chunk),
                            Err(e) => {
                                self.done = true;
                                return Some(Err(invalid(&e.to_string())));
                            }
                        }
                    }
                }
                Event::End(e) => {
                    if self.in_section && e.name().local_name().as_ref() == SECTION_ELEMENT {
                        return Some(Ok(self.finish_section()));
                    }
                }
                Event::Eof => {
                    // An unclosed section at EOF is not emitted.
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

fn invalid(message: &str) -> EtlError {
    EtlError::new(EtlErrorCode::InvalidData, format!("title xml: {message}"))
}

fn attr(start: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    start
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::TitleXmlParser;
    use std::io::Cursor;

    fn parse(xml: &str) -> Vec<ecfr_atlas_model::RawSection> {
        TitleXmlParser::new(Cursor::new(xml.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .expect("parse")
    }

    #[test]
    fn sections_carry_the_enclosing_chapter_label() {
        let xml = r#"<ECFR>
            <DIV3 TYPE="CHAPTER" N="I">
                <DIV8 TYPE="SECTION" N="&#167; 40.1">Purpose and scope.</DIV8>
                <DIV8 TYPE="SECTION" N="&#167; 40.2">Definitions.</DIV8>
            </DIV3>
            <DIV3 TYPE="CHAPTER" N="II">
                <DIV8 TYPE="SECTION" N="&#167; 1400.1">Other chapter.</DIV8>
            </DIV3>
        </ECFR>"#;
        let sections = parse(xml);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].id, "§ 40.1");
        assert_eq!(sections[0].chapter, "I");
        assert_eq!(sections[0].text.trim(), "Purpose and scope.");
        assert_eq!(sections[2].chapter, "II");
    }

    #[test]
    fn sections_before_any_chapter_have_empty_chapter() {
        let xml = r#"<ECFR><DIV8 N="1.1">Front matter.</DIV8></ECFR>"#;
        let sections = parse(xml);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].chapter, "");
    }

    #[test]
    fn nested_text_inside_a_section_is_concatenated() {
        let xml = r#"<ECFR><DIV8 N="1.1"><HEAD>Scope.</HEAD><P>First.</P><P>Second.</P></DIV8></ECFR>"#;
        let sections = parse(xml);
        assert_eq!(sections[0].text, "Scope.First.Second.");
    }

    #[test]
    fn unclosed_section_at_eof_is_not_emitted() {
        let xml = r#"<ECFR><DIV8 N="1.1">dangling"#;
        let sections: Vec<_> = TitleXmlParser::new(Cursor::new(xml.as_bytes()))
            .filter_map(|r| r.ok())
            .collect();
        assert!(sections.is_empty());
    }

    #[test]
    fn self_closing_section_yields_empty_text() {
        let xml = r#"<ECFR><DIV3 TYPE="CHAPTER" N="V"/><DIV8 N="500.1"/></ECFR>"#;
        let sections = parse(xml);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "");
        assert_eq!(sections[0].chapter, "V");
    }

    #[test]
    fn section_reentry_starts_a_fresh_buffer() {
        // Not expected upstream, but re-entry must not bleed text across ids.
        let xml = r#"<ECFR><DIV8 N="1.1">first<DIV8 N="1.2">second</DIV8></DIV8></ECFR>"#;
        let sections = parse(xml);
        assert_eq!(sections[0].id, "1.2");
        assert_eq!(sections[0].text, "second");
    }

    #[test]
    fn amendment_date_attribute_is_carried_when_present() {
        let xml = r#"<ECFR><DIV8 N="1.1" AMDDATE="2023-07-15">t</DIV8><DIV8 N="1.2">u</DIV8></ECFR>"#;
        let sections = parse(xml);
        assert_eq!(
            sections[0].rev_date,
            Some(chrono::NaiveDate::from_ymd_opt(2023, 7, 15).expect("date"))
        );
        assert_eq!(sections[1].rev_date, None);
    }

    #[test]
    fn malformed_xml_surfaces_invalid_data() {
        let xml = r#"<ECFR><DIV8 N="1.1">text</DIV9></ECFR>"#;
        let err = TitleXmlParser::new(Cursor::new(xml.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .expect_err("mismatched close must fail");
        assert_eq!(err.code, ecfr_atlas_core::EtlErrorCode::InvalidData);
    }
}
