//! Import of monthly salaries from a payroll spreadsheet.
//!
//! Rows are mapped by configurable column names. Every row ends up as an
//! [`ImportedElement`]; rows with errors stay in the sheet for display but are never
//! persisted.

use crate::config::SalaryImportColumns;
use crate::model::employee::StaffNumber;
use crate::model::salary::{EmployeeSalary, SalaryType};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

pub const SHEET_NAME: &str = "employeeSalaries";

#[derive(Debug, Error)]
pub enum SalaryImportError {
    #[error("no column names configured for staff number and salary")]
    NoColumnDefinition,
    #[error("columns '{staff_number}' and '{salary}' not found in the sheet")]
    ColumnDefinitionNotFound { staff_number: String, salary: String },
    #[error("unreadable sheet: {0}")]
    Sheet(#[from] csv::Error),
}

/// Column positions of the mapped properties in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    staff_number: String,
    salary: String,
    remark: Option<String>,
}

impl ColumnMapping {
    pub fn from_config(columns: &SalaryImportColumns) -> Result<Self, SalaryImportError> {
        match (&columns.staff_number, &columns.salary) {
            (Some(staff_number), Some(salary)) => Ok(Self {
                staff_number: staff_number.clone(),
                salary: salary.clone(),
                remark: columns.remark.clone(),
            }),
            _ => Err(SalaryImportError::NoColumnDefinition),
        }
    }

    fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns, SalaryImportError> {
        let position = |name: &str| headers.iter().position(|h| h == name);
        match (position(&self.staff_number), position(&self.salary)) {
            (Some(staff_number), Some(salary)) => Ok(ResolvedColumns {
                staff_number,
                salary,
                remark: self.remark.as_deref().and_then(position),
            }),
            _ => Err(SalaryImportError::ColumnDefinitionNotFound {
                staff_number: self.staff_number.clone(),
                salary: self.salary.clone(),
            }),
        }
    }
}

struct ResolvedColumns {
    staff_number: usize,
    salary: usize,
    remark: Option<usize>,
}

/// Salary record as it would be written by the import.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalaryDraft {
    /// Set when an existing record for the month is updated.
    pub id: Option<u64>,
    pub employee_id: u64,
    pub year: i32,
    pub month: u32,
    pub salary_type: SalaryType,
    #[schema(value_type = String)]
    pub gross_with_employer_share: Decimal,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FieldChange {
    pub property: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportedElement {
    pub index: usize,
    /// 1-based row number in the spreadsheet, header row included.
    pub row_number: usize,
    pub staff_number: Option<String>,
    pub value: Option<SalaryDraft>,
    /// Property name to offending cell value.
    pub errors: BTreeMap<String, String>,
    pub changes: Vec<FieldChange>,
}

impl ImportedElement {
    pub fn is_faulty(&self) -> bool {
        !self.errors.is_empty() || self.value.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImportedSheet {
    pub name: String,
    pub year: i32,
    pub month: u32,
    pub elements: Vec<ImportedElement>,
}

impl ImportedSheet {
    pub fn faulty_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_faulty()).count()
    }

    pub fn valid_count(&self) -> usize {
        self.elements.len() - self.faulty_count()
    }

    /// Drafts of error-free rows, the only ones that get persisted.
    pub fn valid_drafts(&self) -> impl Iterator<Item = &SalaryDraft> {
        self.elements
            .iter()
            .filter(|e| !e.is_faulty())
            .filter_map(|e| e.value.as_ref())
    }
}

/// Employees by staff number and their stored salaries for the imported month.
#[derive(Debug, Default)]
pub struct SalaryDirectory {
    employees: HashMap<StaffNumber, u64>,
    salaries: HashMap<u64, EmployeeSalary>,
}

impl SalaryDirectory {
    pub fn new(
        employees: impl IntoIterator<Item = (StaffNumber, u64)>,
        salaries: impl IntoIterator<Item = EmployeeSalary>,
    ) -> Self {
        Self {
            employees: employees.into_iter().collect(),
            salaries: salaries.into_iter().map(|s| (s.employee_id, s)).collect(),
        }
    }
}

/// Parses `4.250,00`, `4,250.00`, `4250,5`, `4250.50`, `4.250` or `1,234,567`.
///
/// A lone separator followed by exactly three digits groups thousands; any other lone
/// separator is the decimal point.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => single_separator(&cleaned, ',')?,
        (None, Some(_)) => single_separator(&cleaned, '.')?,
        (None, None) => cleaned,
    };
    Decimal::from_str(&normalized).ok()
}

fn single_separator(cleaned: &str, separator: char) -> Option<String> {
    let groups: Vec<&str> = cleaned.split(separator).collect();
    if groups.len() > 2 {
        return groups[1..]
            .iter()
            .all(|g| g.len() == 3)
            .then(|| groups.concat());
    }
    let leading = groups[0].trim_start_matches(['-', '+']);
    if groups[1].len() == 3 && leading.len() <= 3 && !matches!(leading, "" | "0") {
        Some(groups.concat())
    } else {
        Some(cleaned.replacen(separator, ".", 1))
    }
}

/// Amounts the salary column, `DECIMAL(12, 2)`, cannot hold exactly are rejected, as are
/// negative ones.
fn storable_amount(amount: Decimal) -> Option<Decimal> {
    let max = Decimal::new(999_999_999_999, 2);
    let storable =
        !amount.is_sign_negative() && amount.normalize().scale() <= 2 && amount <= max;
    storable.then_some(amount)
}

/// Reads the sheet and maps every data row for the month of `date`.
pub fn import_salaries<R: Read>(
    reader: R,
    mapping: &ColumnMapping,
    directory: &SalaryDirectory,
    date: NaiveDate,
) -> Result<ImportedSheet, SalaryImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    let columns = mapping.resolve(&headers)?;

    let mut sheet = ImportedSheet {
        name: SHEET_NAME.to_string(),
        year: date.year(),
        month: date.month(),
        elements: Vec::new(),
    };
    let mut seen = HashSet::new();

    // Cells are decoded one by one so a stray non UTF-8 byte only spoils its own row.
    for (offset, record) in csv_reader.byte_records().enumerate() {
        let record = record?;
        if record.iter().all(<[u8]>::is_empty) {
            continue;
        }
        let mut errors = BTreeMap::new();
        let cells = RowCells {
            staff_number: decode_cell(&record, Some(columns.staff_number), "user", &mut errors),
            salary: decode_cell(&record, Some(columns.salary), "salary", &mut errors),
            remark: decode_cell(&record, columns.remark, "comment", &mut errors),
        };
        let element = convert_row(
            sheet.elements.len() + 1,
            // header is row 1
            offset + 2,
            cells,
            errors,
            directory,
            &mut seen,
            &sheet,
        );
        sheet.elements.push(element);
    }

    tracing::info!(
        sheet = SHEET_NAME,
        rows = sheet.elements.len(),
        faulty = sheet.faulty_count(),
        "Salary sheet parsed"
    );
    Ok(sheet)
}

struct RowCells<'r> {
    staff_number: Option<&'r str>,
    salary: Option<&'r str>,
    remark: Option<&'r str>,
}

fn decode_cell<'r>(
    record: &'r csv::ByteRecord,
    index: Option<usize>,
    property: &str,
    errors: &mut BTreeMap<String, String>,
) -> Option<&'r str> {
    let raw = record.get(index?).filter(|c| !c.is_empty())?;
    match std::str::from_utf8(raw) {
        Ok(text) => Some(text),
        Err(_) => {
            errors.insert(property.to_string(), String::from_utf8_lossy(raw).into_owned());
            None
        }
    }
}

fn convert_row(
    index: usize,
    row_number: usize,
    cells: RowCells<'_>,
    errors: BTreeMap<String, String>,
    directory: &SalaryDirectory,
    seen: &mut HashSet<StaffNumber>,
    sheet: &ImportedSheet,
) -> ImportedElement {
    let mut element = ImportedElement {
        index,
        row_number,
        staff_number: cells.staff_number.map(str::to_string),
        value: None,
        errors,
        changes: Vec::new(),
    };
    if !element.errors.is_empty() {
        return element;
    }

    let Some(staff_number) = cells.staff_number.and_then(StaffNumber::parse) else {
        element.errors.insert("user".to_string(), String::new());
        return element;
    };
    if !seen.insert(staff_number.clone()) {
        // a second row for the same person would overwrite the first on commit
        element
            .errors
            .insert("user".to_string(), staff_number.to_string());
        return element;
    }
    let Some(&employee_id) = directory.employees.get(&staff_number) else {
        element
            .errors
            .insert("user".to_string(), staff_number.to_string());
        return element;
    };
    let salary = cells.salary;
    let Some(amount) = salary.and_then(parse_amount).and_then(storable_amount) else {
        element
            .errors
            .insert("salary".to_string(), salary.unwrap_or_default().to_string());
        return element;
    };

    let existing = directory.salaries.get(&employee_id);
    let remark = cells.remark.filter(|r| !r.trim().is_empty()).map(str::to_string);
    let draft = match existing {
        Some(stored) => SalaryDraft {
            id: Some(stored.id),
            employee_id,
            year: sheet.year,
            month: sheet.month,
            salary_type: stored.salary_type,
            gross_with_employer_share: amount,
            comment: remark.or_else(|| stored.comment.clone()),
        },
        None => SalaryDraft {
            id: None,
            employee_id,
            year: sheet.year,
            month: sheet.month,
            salary_type: SalaryType::Salary,
            gross_with_employer_share: amount,
            comment: remark,
        },
    };

    element.changes = diff(existing, &draft);
    element.value = Some(draft);
    element
}

fn diff(existing: Option<&EmployeeSalary>, draft: &SalaryDraft) -> Vec<FieldChange> {
    let old_gross = existing.map(|s| s.gross_with_employer_share);
    let old_comment = existing.and_then(|s| s.comment.clone());

    let mut changes = Vec::new();
    // 4250 and 4250.00 are the same amount.
    if old_gross != Some(draft.gross_with_employer_share) {
        changes.push(FieldChange {
            property: "gross_with_employer_share".to_string(),
            old_value: old_gross.map(|g| g.to_string()),
            new_value: Some(draft.gross_with_employer_share.to_string()),
        });
    }
    if old_comment != draft.comment {
        changes.push(FieldChange {
            property: "comment".to_string(),
            old_value: old_comment,
            new_value: draft.comment.clone(),
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn mapping() -> ColumnMapping {
        ColumnMapping::from_config(&SalaryImportColumns {
            staff_number: Some("Personalnummer".to_string()),
            salary: Some("Brutto".to_string()),
            remark: Some("Bemerkung".to_string()),
        })
        .unwrap()
    }

    fn directory() -> SalaryDirectory {
        SalaryDirectory::new(
            [
                (StaffNumber::from("1001".to_string()), 1),
                (StaffNumber::from("1002".to_string()), 2),
            ],
            [EmployeeSalary {
                id: 55,
                employee_id: 2,
                year: 2026,
                month: 3,
                salary_type: SalaryType::Salary,
                gross_with_employer_share: dec!(3900.00),
                comment: Some("raise pending".to_string()),
            }],
        )
    }

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn missing_column_configuration_is_rejected() {
        let err = ColumnMapping::from_config(&SalaryImportColumns {
            staff_number: Some("Personalnummer".to_string()),
            salary: None,
            remark: None,
        })
        .unwrap_err();
        assert!(matches!(err, SalaryImportError::NoColumnDefinition));
    }

    #[test]
    fn sheet_without_configured_columns_is_rejected() {
        let csv = "Name,Gehalt\nAnna,4000\n";
        let err = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap_err();
        assert!(matches!(
            err,
            SalaryImportError::ColumnDefinitionNotFound { ref staff_number, .. } if staff_number == "Personalnummer"
        ));
    }

    #[test]
    fn rows_are_mapped_to_new_and_existing_salaries() {
        let csv = "Personalnummer,Name,Brutto,Bemerkung\n\
                   1001,Anna,\"4.250,00\",\n\
                   1002,Bert,4100.50,\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();

        assert_eq!(sheet.name, SHEET_NAME);
        assert_eq!(sheet.valid_count(), 2);

        let created = sheet.elements[0].value.as_ref().unwrap();
        assert_eq!(created.id, None);
        assert_eq!(created.employee_id, 1);
        assert_eq!((created.year, created.month), (2026, 3));
        assert_eq!(created.gross_with_employer_share, dec!(4250.00));
        assert_eq!(created.salary_type, SalaryType::Salary);

        let updated = sheet.elements[1].value.as_ref().unwrap();
        assert_eq!(updated.id, Some(55));
        assert_eq!(updated.comment.as_deref(), Some("raise pending"));
        assert_eq!(sheet.elements[1].changes.len(), 1);
        assert_eq!(sheet.elements[1].changes[0].property, "gross_with_employer_share");
    }

    #[test]
    fn row_without_staff_number_is_flagged_and_not_persisted() {
        let csv = "Personalnummer,Brutto,Bemerkung\n\
                   ,4000,new hire\n\
                   1001,4250,\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();

        assert_eq!(sheet.elements.len(), 2);
        assert!(sheet.elements[0].is_faulty());
        assert!(sheet.elements[0].errors.contains_key("user"));
        assert_eq!(sheet.elements[0].row_number, 2);
        assert_eq!(sheet.faulty_count(), 1);
        let persisted: Vec<_> = sheet.valid_drafts().collect();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].employee_id, 1);
    }

    #[test]
    fn unknown_staff_number_and_bad_salary_are_flagged() {
        let csv = "Personalnummer,Brutto\n\
                   9999,4000\n\
                   1001,lots\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();

        assert_eq!(sheet.elements[0].errors.get("user").map(String::as_str), Some("9999"));
        assert_eq!(sheet.elements[1].errors.get("salary").map(String::as_str), Some("lots"));
        assert_eq!(sheet.valid_drafts().count(), 0);
    }

    #[test]
    fn remark_overrides_comment_only_when_present() {
        let csv = "Personalnummer,Brutto,Bemerkung\n\
                   1002,3900.00,bonus included\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();
        let element = &sheet.elements[0];
        assert_eq!(
            element.value.as_ref().unwrap().comment.as_deref(),
            Some("bonus included")
        );
        assert_eq!(element.changes.len(), 1);
        assert_eq!(element.changes[0].property, "comment");
    }

    #[test]
    fn same_amount_with_other_scale_is_no_change() {
        let csv = "Personalnummer,Brutto\n1002,3900\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();
        assert!(sheet.elements[0].changes.is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let csv = "Personalnummer,Brutto\n1001,4000\n,\n\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();
        assert_eq!(sheet.elements.len(), 1);
    }

    #[test]
    fn row_with_undecodable_cell_does_not_spoil_the_sheet() {
        let mut csv = b"Personalnummer,Brutto,Bemerkung\n1001,4000,\n1002,4100,M".to_vec();
        // Windows-1252 umlaut
        csv.extend_from_slice(b"\xFCller\n");
        let sheet = import_salaries(csv.as_slice(), &mapping(), &directory(), march()).unwrap();

        assert_eq!(sheet.elements.len(), 2);
        assert!(!sheet.elements[0].is_faulty());
        assert!(sheet.elements[1].is_faulty());
        assert_eq!(sheet.elements[1].errors.get("comment").map(String::as_str), Some("M\u{FFFD}ller"));
        assert_eq!(sheet.valid_drafts().count(), 1);
    }

    #[test]
    fn undecodable_unmapped_column_is_ignored() {
        let mut csv = b"Personalnummer,Name,Brutto\n1001,Anna,4000\n1002,M".to_vec();
        csv.extend_from_slice(b"\xFCller,4100\n");
        let sheet = import_salaries(csv.as_slice(), &mapping(), &directory(), march()).unwrap();
        assert_eq!(sheet.valid_count(), 2);
    }

    #[test]
    fn repeated_staff_number_is_flagged() {
        let csv = "Personalnummer,Brutto\n1001,4000\n1001,9000\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();

        assert_eq!((sheet.valid_count(), sheet.faulty_count()), (1, 1));
        assert_eq!(sheet.elements[1].errors.get("user").map(String::as_str), Some("1001"));
        let persisted: Vec<_> = sheet.valid_drafts().collect();
        assert_eq!(persisted[0].gross_with_employer_share, dec!(4000));
    }

    #[test]
    fn amounts_the_column_cannot_hold_are_flagged() {
        let csv = "Personalnummer,Brutto\n1001,12345678901234.56\n1002,-4000\n";
        let sheet = import_salaries(csv.as_bytes(), &mapping(), &directory(), march()).unwrap();

        assert_eq!(sheet.faulty_count(), 2);
        assert_eq!(
            sheet.elements[0].errors.get("salary").map(String::as_str),
            Some("12345678901234.56")
        );
        assert!(sheet.elements[1].errors.contains_key("salary"));
    }

    #[test]
    fn amount_limits() {
        assert_eq!(storable_amount(dec!(9999999999.99)), Some(dec!(9999999999.99)));
        assert_eq!(storable_amount(dec!(10000000000)), None);
        assert_eq!(storable_amount(dec!(4250.500)), Some(dec!(4250.5)));
        assert_eq!(storable_amount(dec!(4250.505)), None);
        assert_eq!(storable_amount(dec!(0)), Some(dec!(0)));
        assert_eq!(storable_amount(dec!(-1)), None);
    }

    #[test]
    fn lone_separator_before_three_digits_groups_thousands() {
        assert_eq!(parse_amount("4.250"), Some(dec!(4250)));
        assert_eq!(parse_amount("4,250"), Some(dec!(4250)));
        assert_eq!(parse_amount("1.234.567"), Some(dec!(1234567)));
        assert_eq!(parse_amount("1,234,567"), Some(dec!(1234567)));
        assert_eq!(parse_amount("1.23.4"), None);
        assert_eq!(parse_amount("0,125"), Some(dec!(0.125)));
        assert_eq!(parse_amount("4250,500"), Some(dec!(4250.5)));
    }

    #[test]
    fn amounts_in_both_notations() {
        assert_eq!(parse_amount("4.250,00"), Some(dec!(4250.00)));
        assert_eq!(parse_amount("4,250.00"), Some(dec!(4250.00)));
        assert_eq!(parse_amount("4250,5"), Some(dec!(4250.5)));
        assert_eq!(parse_amount(" 4 250.75 "), Some(dec!(4250.75)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }
}
