//! Declarative page layouts shared by the HTML adapters
//!
//! A layout maps raw fields to selector cascades. Adapters only describe
//! where things live; reading the page is always done here, through
//! [`crate::extraction`].

use scraper::{ElementRef, Selector};
use tracing::trace;

use crate::Result;
use crate::extraction::{self, Row, Rule};
use crate::normalize::{RawField, RawRecord};

/// Field cascades for a single block (daily summary card, day-part box)
#[derive(Debug, Clone)]
pub struct BlockLayout {
    containers: Vec<Selector>,
    fields: Vec<(RawField, Vec<Rule>)>,
}

impl BlockLayout {
    /// `containers` are tried in order to find the block
    pub fn new(containers: &[&str]) -> Result<Self> {
        Ok(Self {
            containers: extraction::selectors(containers)?,
            fields: Vec::new(),
        })
    }

    #[must_use]
    pub fn field(mut self, field: RawField, rules: Vec<Rule>) -> Self {
        self.fields.push((field, rules));
        self
    }

    /// First matching block below `root`
    #[must_use]
    pub fn locate<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        extraction::locate(root, &self.containers)
    }

    /// Every block matching the first container selector that matches at all
    #[must_use]
    pub fn locate_all<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.containers
            .iter()
            .map(|selector| root.select(selector).collect::<Vec<_>>())
            .find(|blocks| !blocks.is_empty())
            .unwrap_or_default()
    }

    /// Run every cascade against `block`; its text becomes the context field
    #[must_use]
    pub fn read(&self, block: ElementRef<'_>) -> RawRecord {
        let mut raw = RawRecord::new();
        for (field, rules) in &self.fields {
            raw.set_opt(*field, extraction::extract(block, rules));
        }
        raw.set(RawField::Context, extraction::element_text(block));
        raw
    }

    /// Locate and read; an absent block yields an empty record
    #[must_use]
    pub fn extract(&self, root: ElementRef<'_>) -> RawRecord {
        self.locate(root).map(|block| self.read(block)).unwrap_or_default()
    }
}

/// Column cascades for an hourly table
#[derive(Debug, Clone)]
pub struct TableLayout {
    tables: Vec<Selector>,
    min_columns: usize,
    skip_header_rows: usize,
    columns: Vec<(usize, RawField, Vec<Rule>)>,
}

impl TableLayout {
    pub fn new(tables: &[&str], min_columns: usize, skip_header_rows: usize) -> Result<Self> {
        Ok(Self {
            tables: extraction::selectors(tables)?,
            min_columns,
            skip_header_rows,
            columns: Vec::new(),
        })
    }

    /// Read `field` from the cell at `index` (several fields may share a cell)
    #[must_use]
    pub fn column(mut self, index: usize, field: RawField, rules: Vec<Rule>) -> Self {
        self.columns.push((index, field, rules));
        self
    }

    fn read_row(&self, row: &Row<'_>) -> RawRecord {
        let mut raw = RawRecord::new();
        for (index, field, rules) in &self.columns {
            raw.set_opt(*field, row.extract(*index, rules));
        }
        raw.set(RawField::Context, row.text());
        raw
    }

    /// Rows of the first matching table; `None` when the page has no table
    ///
    /// Rows without a label or without a single weather field are dropped.
    pub fn extract(&self, root: ElementRef<'_>) -> Result<Option<Vec<RawRecord>>> {
        let Some(table) = extraction::locate(root, &self.tables) else {
            return Ok(None);
        };
        let records = extraction::extract_rows(table, self.min_columns, self.skip_header_rows)?
            .iter()
            .map(|row| self.read_row(row))
            .filter(|raw| {
                let keep = raw.get(RawField::Label).is_some() && raw.has_weather_fields();
                if !keep {
                    trace!("dropping row without label or data: {raw:?}");
                }
                keep
            })
            .collect();
        Ok(Some(records))
    }
}

/// Shorthand for `Rule::text` cascades
pub fn texts(css: &[&str]) -> Result<Vec<Rule>> {
    css.iter().map(|c| Rule::text(c)).collect()
}

/// Shorthand for the same attribute read from several selectors
pub fn attrs(css: &[&str], attribute: &str) -> Result<Vec<Rule>> {
    css.iter().map(|c| Rule::attr(c, attribute)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const PAGE: &str = r#"
        <div class="card"><span class="max">18°</span><p>Sereno</p></div>
        <table class="hours">
          <tr><th>Ora</th><th>Temp</th></tr>
          <tr><td>09</td><td>12°</td></tr>
          <tr><td></td><td>13°</td></tr>
          <tr><td>10</td><td></td></tr>
          <tr><td>11</td><td>15°</td></tr>
        </table>
    "#;

    #[test]
    fn test_block_layout_reads_fields_and_context() {
        let doc = Html::parse_document(PAGE);
        let layout = BlockLayout::new(&[".summary", ".card"])
            .unwrap()
            .field(RawField::MaxTemp, texts(&[".tmax", ".max"]).unwrap())
            .field(RawField::MinTemp, texts(&[".tmin"]).unwrap());

        let raw = layout.extract(doc.root_element());
        assert_eq!(raw.get(RawField::MaxTemp), Some("18°"));
        assert_eq!(raw.get(RawField::MinTemp), None);
        assert_eq!(raw.get(RawField::Context), Some("18° Sereno"));
    }

    #[test]
    fn test_table_layout_drops_unlabelled_and_empty_rows() {
        let doc = Html::parse_document(PAGE);
        let layout = TableLayout::new(&["table.hourly", "table.hours"], 2, 1)
            .unwrap()
            .column(0, RawField::Label, texts(&["td"]).unwrap())
            .column(1, RawField::Temperature, texts(&["td"]).unwrap());

        let rows = layout.extract(doc.root_element()).unwrap().unwrap();
        let labels: Vec<_> = rows.iter().filter_map(|r| r.get(RawField::Label)).collect();
        assert_eq!(labels, vec!["09", "11"]);
    }

    #[test]
    fn test_missing_table_is_none() {
        let doc = Html::parse_document("<p>nothing here</p>");
        let layout = TableLayout::new(&["table"], 2, 0).unwrap();
        assert!(layout.extract(doc.root_element()).unwrap().is_none());
    }
}
