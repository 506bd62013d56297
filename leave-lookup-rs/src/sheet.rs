//! Parsing of the published leave spreadsheet (CSV export)
//!
//! Plain comma splitting, no quoted fields. Columns are located by header
//! name, so the sheet owner may reorder them freely.

use relay_types::LeaveBalance;

use crate::LookupError;

pub const NAME_COLUMN: &str = "이름";
pub const CREDENTIAL_COLUMN: &str = "생년월일";
pub const ALTERNATE_CREDENTIAL_COLUMN: &str = "비밀번호";
pub const REMAINING_DAYS_COLUMN: &str = "현재 잔여 연차";

const DEFAULT_REMAINING_DAYS: &str = "0";

/// One employee row; empty cells are stored as `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRecord {
    pub name: String,
    pub credential: Option<String>,
    pub alternate_credential: Option<String>,
    pub remaining_days: Option<String>,
}

impl LeaveRecord {
    fn matches(&self, name: &str, credential: &str, allow_missing_credential: bool) -> bool {
        if self.name != name {
            return false;
        }

        let primary = self.credential.as_deref() == Some(credential);
        let alternate = self.alternate_credential.as_deref() == Some(credential);
        // Legacy rows without a credential match on name alone while the flag is on
        let missing = allow_missing_credential && self.credential.is_none();

        primary || alternate || missing
    }

    fn balance(&self) -> LeaveBalance {
        LeaveBalance {
            name: self.name.clone(),
            remaining_days: self
                .remaining_days
                .clone()
                .unwrap_or_else(|| DEFAULT_REMAINING_DAYS.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    width: usize,
    name: usize,
    credential: Option<usize>,
    alternate_credential: Option<usize>,
    remaining_days: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self, LookupError> {
        let position = |column: &str| header.iter().position(|h| h == column);

        let name = position(NAME_COLUMN).ok_or_else(|| {
            LookupError::MalformedSheet(format!("header has no '{}' column", NAME_COLUMN))
        })?;

        Ok(Self {
            width: header.len(),
            name,
            credential: position(CREDENTIAL_COLUMN),
            alternate_credential: position(ALTERNATE_CREDENTIAL_COLUMN),
            remaining_days: position(REMAINING_DAYS_COLUMN),
        })
    }

    fn record(&self, cells: &[String]) -> Option<LeaveRecord> {
        if cells.len() != self.width {
            return None;
        }

        let cell = |index: Option<usize>| {
            index
                .map(|i| cells[i].clone())
                .filter(|value| !value.is_empty())
        };

        Some(LeaveRecord {
            name: cells[self.name].clone(),
            credential: cell(self.credential),
            alternate_credential: cell(self.alternate_credential),
            remaining_days: cell(self.remaining_days),
        })
    }
}

/// Every record that survived header validation
#[derive(Debug, Clone, Default)]
pub struct LeaveSheet {
    pub records: Vec<LeaveRecord>,
    pub rejected_rows: usize,
}

impl LeaveSheet {
    /// First record matching name and credential, as a balance
    pub fn find_balance(
        &self,
        name: &str,
        credential: &str,
        allow_missing_credential: bool,
    ) -> Option<LeaveBalance> {
        self.records
            .iter()
            .find(|record| record.matches(name, credential, allow_missing_credential))
            .map(LeaveRecord::balance)
    }
}

fn split_cells(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

/// Parse raw CSV text into validated records
///
/// Rows whose cell count differs from the header are skipped and counted.
pub fn parse_sheet(text: &str) -> Result<LeaveSheet, LookupError> {
    let mut lines = text
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .map(split_cells)
        .ok_or_else(|| LookupError::MalformedSheet("sheet is empty".to_string()))?;
    let columns = ColumnMap::from_header(&header)?;

    let mut sheet = LeaveSheet::default();
    for (index, line) in lines.enumerate() {
        let cells = split_cells(line);
        match columns.record(&cells) {
            Some(record) => sheet.records.push(record),
            None => {
                // +2: one for the header, one for 1-based numbering
                log::warn!(
                    "Skipping sheet row {}: {} cells, header has {}",
                    index + 2,
                    cells.len(),
                    columns.width
                );
                sheet.rejected_rows += 1;
            }
        }
    }

    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "이름,생년월일,현재 잔여 연차\n홍길동,900101,15\n";

    #[test]
    fn test_exact_match_returns_balance() {
        let sheet = parse_sheet(BASIC).unwrap();
        assert_eq!(
            sheet.find_balance("홍길동", "900101", true),
            Some(LeaveBalance {
                name: "홍길동".to_string(),
                remaining_days: "15".to_string(),
            })
        );
    }

    #[test]
    fn test_wrong_credential_is_not_found() {
        let sheet = parse_sheet(BASIC).unwrap();
        assert_eq!(sheet.find_balance("홍길동", "999999", true), None);
        assert_eq!(sheet.find_balance("김철수", "900101", true), None);
    }

    #[test]
    fn test_empty_credential_matches_only_with_flag() {
        let sheet = parse_sheet("이름,생년월일,현재 잔여 연차\n홍길동,,7\n").unwrap();
        assert_eq!(
            sheet.find_balance("홍길동", "999999", true).map(|b| b.remaining_days),
            Some("7".to_string())
        );
        assert_eq!(sheet.find_balance("홍길동", "999999", false), None);
    }

    #[test]
    fn test_absent_credential_column_behaves_like_empty_cell() {
        let sheet = parse_sheet("이름,현재 잔여 연차\n홍길동,3\n").unwrap();
        assert!(sheet.find_balance("홍길동", "123456", true).is_some());
        assert!(sheet.find_balance("홍길동", "123456", false).is_none());
    }

    #[test]
    fn test_alternate_credential_column() {
        let sheet = parse_sheet("이름,생년월일,비밀번호,현재 잔여 연차\n홍길동,900101,abc123,12\n").unwrap();
        assert_eq!(
            sheet.find_balance("홍길동", "abc123", false).map(|b| b.remaining_days),
            Some("12".to_string())
        );
    }

    #[test]
    fn test_cells_are_trimmed_uniformly() {
        let sheet = parse_sheet(" 이름 , 생년월일 ,현재 잔여 연차 \r\n 홍길동 , 900101 , 15 \r\n").unwrap();
        let balance = sheet.find_balance("홍길동", "900101", false).unwrap();
        assert_eq!(balance.name, "홍길동");
        assert_eq!(balance.remaining_days, "15");
    }

    #[test]
    fn test_column_order_is_free() {
        let sheet = parse_sheet("현재 잔여 연차,생년월일,부서,이름\n9.5,880202,생산팀,이영희\n").unwrap();
        assert_eq!(
            sheet.find_balance("이영희", "880202", false).map(|b| b.remaining_days),
            Some("9.5".to_string())
        );
    }

    #[test]
    fn test_missing_remaining_days_defaults_to_zero() {
        let sheet = parse_sheet("이름,생년월일,현재 잔여 연차\n홍길동,900101,\n").unwrap();
        assert_eq!(
            sheet.find_balance("홍길동", "900101", false).map(|b| b.remaining_days),
            Some("0".to_string())
        );
    }

    #[test]
    fn test_rows_with_wrong_width_are_rejected() {
        let text = "이름,생년월일,현재 잔여 연차\n홍길동,900101\n홍길동,900101,15,extra\n김철수,850505,4\n";
        let sheet = parse_sheet(text).unwrap();
        assert_eq!(sheet.rejected_rows, 2);
        assert_eq!(sheet.records.len(), 1);
        assert!(sheet.find_balance("홍길동", "900101", true).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let text = "이름,생년월일,현재 잔여 연차\n홍길동,900101,15\n홍길동,900101,2\n";
        let sheet = parse_sheet(text).unwrap();
        assert_eq!(
            sheet.find_balance("홍길동", "900101", false).map(|b| b.remaining_days),
            Some("15".to_string())
        );
    }

    #[test]
    fn test_malformed_sheets() {
        assert!(matches!(parse_sheet(""), Err(LookupError::MalformedSheet(_))));
        assert!(matches!(
            parse_sheet("성명,생년월일\n홍길동,900101\n"),
            Err(LookupError::MalformedSheet(_))
        ));
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let sheet = parse_sheet("\u{feff}이름,생년월일,현재 잔여 연차\n홍길동,900101,15\n").unwrap();
        assert_eq!(sheet.records.len(), 1);
    }
}
