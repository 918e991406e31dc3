use anyhow::{anyhow, Context};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
const ROOT_RELS_ENTRY: &str = "_rels/.rels";
const WORKBOOK_ENTRY: &str = "xl/workbook.xml";
const WORKBOOK_RELS_ENTRY: &str = "xl/_rels/workbook.xml.rels";
const STYLES_ENTRY: &str = "xl/styles.xml";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const MAX_SHEET_NAME_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Blank,
}

/// Index into the fixed `cellXfs` table written to styles.xml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    Header,
    OneDecimal,
}

impl CellStyle {
    fn xf_index(self) -> u32 {
        match self {
            CellStyle::Plain => 0,
            CellStyle::Header => 1,
            CellStyle::OneDecimal => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(s.into()),
            style: CellStyle::Plain,
        }
    }

    pub fn number(v: f64) -> Self {
        Self {
            value: CellValue::Number(v),
            style: CellStyle::Plain,
        }
    }

    /// Numeric cell displayed with exactly one decimal.
    pub fn one_decimal(v: f64) -> Self {
        Self {
            value: CellValue::Number(v),
            style: CellStyle::OneDecimal,
        }
    }

    pub fn header(s: impl Into<String>) -> Self {
        Self {
            value: CellValue::Text(s.into()),
            style: CellStyle::Header,
        }
    }

    #[cfg(test)]
    pub fn blank() -> Self {
        Self {
            value: CellValue::Blank,
            style: CellStyle::Plain,
        }
    }

    /// Styled filler for the covered part of a merged header.
    pub fn header_blank() -> Self {
        Self {
            value: CellValue::Blank,
            style: CellStyle::Header,
        }
    }
}

/// Inclusive, zero-based cell rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergeRange {
    pub fn a1(&self) -> String {
        format!(
            "{}:{}",
            cell_ref(self.first_row, self.first_col),
            cell_ref(self.last_row, self.last_col)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<Cell>>,
    merges: Vec<MergeRange>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            merges: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[cfg(test)]
    pub fn merges(&self) -> &[MergeRange] {
        &self.merges
    }

    /// Appends a row and returns its zero-based index.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> usize {
        self.rows.push(cells);
        self.rows.len() - 1
    }

    pub fn merge(&mut self, first_row: usize, first_col: usize, last_row: usize, last_col: usize) {
        self.merges.push(MergeRange {
            first_row,
            first_col,
            last_row,
            last_col,
        });
    }
}

#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub sheet_names: Vec<String>,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    #[cfg(test)]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn write_to_path(&self, out_path: &Path) -> anyhow::Result<WriteSummary> {
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.to_string_lossy())
                })?;
            }
        }

        let out_file = File::create(out_path).with_context(|| {
            format!(
                "failed to create output file {}",
                out_path.to_string_lossy()
            )
        })?;
        self.write(out_file)
    }

    /// Writes the workbook as an OOXML package.
    pub fn write<W: Write + Seek>(&self, out: W) -> anyhow::Result<WriteSummary> {
        self.validate()?;

        let mut zip = ZipWriter::new(out);
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts: Vec<(String, String)> = vec![
            (CONTENT_TYPES_ENTRY.to_string(), self.content_types_xml()),
            (ROOT_RELS_ENTRY.to_string(), root_rels_xml()),
            (WORKBOOK_ENTRY.to_string(), self.workbook_xml()),
            (WORKBOOK_RELS_ENTRY.to_string(), self.workbook_rels_xml()),
            (STYLES_ENTRY.to_string(), styles_xml()),
        ];
        for (i, sheet) in self.sheets.iter().enumerate() {
            parts.push((sheet_entry(i), sheet_xml(sheet)?));
        }

        for (name, body) in &parts {
            zip.start_file(name.as_str(), opts)
                .with_context(|| format!("failed to start {} entry", name))?;
            zip.write_all(body.as_bytes())
                .with_context(|| format!("failed to write {} entry", name))?;
        }

        zip.finish().context("failed to finalize workbook archive")?;

        Ok(WriteSummary {
            sheet_names: self.sheets.iter().map(|s| s.name.clone()).collect(),
            entry_count: parts.len(),
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.sheets.is_empty() {
            return Err(anyhow!("workbook needs at least one sheet"));
        }
        for (i, sheet) in self.sheets.iter().enumerate() {
            if sheet.name.is_empty() || sheet.name.chars().count() > MAX_SHEET_NAME_LEN {
                return Err(anyhow!("invalid sheet name: {:?}", sheet.name));
            }
            if sheet
                .name
                .chars()
                .any(|c| matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
            {
                return Err(anyhow!("invalid sheet name: {:?}", sheet.name));
            }
            if self.sheets[..i]
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(&sheet.name))
            {
                return Err(anyhow!("duplicate sheet name: {:?}", sheet.name));
            }
        }
        Ok(())
    }

    fn content_types_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
        xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        for i in 0..self.sheets.len() {
            xml.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                sheet_entry(i)
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(&format!(
            r#"<workbook xmlns="{}" xmlns:r="{}"><sheets>"#,
            NS_MAIN, NS_REL
        ));
        for (i, sheet) in self.sheets.iter().enumerate() {
            xml.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            ));
        }
        xml.push_str("</sheets></workbook>");
        xml
    }

    fn workbook_rels_xml(&self) -> String {
        let mut xml = String::from(XML_DECL);
        xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, NS_PKG_REL));
        for i in 0..self.sheets.len() {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                NS_REL,
                i + 1
            ));
        }
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}/styles" Target="styles.xml"/>"#,
            self.sheets.len() + 1,
            NS_REL
        ));
        xml.push_str("</Relationships>");
        xml
    }
}

fn sheet_entry(idx: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", idx + 1)
}

fn root_rels_xml() -> String {
    format!(
        r#"{}<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        XML_DECL, NS_PKG_REL, NS_REL
    )
}

fn styles_xml() -> String {
    format!(
        concat!(
            "{}<styleSheet xmlns=\"{}\">",
            "<numFmts count=\"1\"><numFmt numFmtId=\"164\" formatCode=\"0.0\"/></numFmts>",
            "<fonts count=\"2\">",
            "<font><sz val=\"11\"/><name val=\"Calibri\"/></font>",
            "<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font>",
            "</fonts>",
            "<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill>",
            "<fill><patternFill patternType=\"gray125\"/></fill></fills>",
            "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>",
            "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
            "<cellXfs count=\"3\">",
            "<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>",
            "<xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\" applyAlignment=\"1\">",
            "<alignment horizontal=\"center\" vertical=\"center\"/></xf>",
            "<xf numFmtId=\"164\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyNumberFormat=\"1\"/>",
            "</cellXfs>",
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
            "</styleSheet>"
        ),
        XML_DECL, NS_MAIN
    )
}

fn sheet_xml(sheet: &Sheet) -> anyhow::Result<String> {
    let mut xml = String::from(XML_DECL);
    write!(xml, r#"<worksheet xmlns="{}"><sheetData>"#, NS_MAIN)?;

    for (r, row) in sheet.rows.iter().enumerate() {
        write!(xml, r#"<row r="{}">"#, r + 1)?;
        for (c, cell) in row.iter().enumerate() {
            let at = cell_ref(r, c);
            let s = cell.style.xf_index();
            match &cell.value {
                CellValue::Text(text) => {
                    write!(
                        xml,
                        r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        at,
                        s,
                        escape_xml(text)
                    )?;
                }
                CellValue::Number(v) if v.is_finite() => {
                    write!(xml, r#"<c r="{}" s="{}"><v>{}</v></c>"#, at, s, v)?;
                }
                CellValue::Number(_) | CellValue::Blank => {
                    if cell.style != CellStyle::Plain {
                        write!(xml, r#"<c r="{}" s="{}"/>"#, at, s)?;
                    }
                }
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !sheet.merges.is_empty() {
        write!(xml, r#"<mergeCells count="{}">"#, sheet.merges.len())?;
        for m in &sheet.merges {
            write!(xml, r#"<mergeCell ref="{}"/>"#, m.a1())?;
        }
        xml.push_str("</mergeCells>");
    }

    xml.push_str("</worksheet>");
    Ok(xml)
}

/// Zero-based column index to letters: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_name(idx: usize) -> String {
    let mut n = idx + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", column_name(col), row + 1)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not legal XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}
