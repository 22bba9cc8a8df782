use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// 시트에서 읽은 원시 셀 값
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(v) => v.is_nan(),
            Cell::Date(_) => false,
        }
    }

    /// 셀을 날짜로 해석. 스프레드시트 일련번호, 날짜/시각 문자열 모두 허용
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(dt) => Some(dt.date()),
            Cell::Number(serial) => excel_serial_to_date(*serial),
            Cell::Text(s) => parse_date_str(s),
            Cell::Empty => None,
        }
    }

    /// 텍스트 컬럼으로 합칠 때 쓰는 문자열 표현
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) if v.is_nan() => None,
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s) if s.trim().is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Date(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// 헤더 한 줄 + 데이터 행들로 이루어진 시트
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    /// 헤더 앞뒤 공백을 제거한 시트 생성
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// 행 길이가 헤더보다 짧으면 빈 셀로 취급
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows[row].get(column).unwrap_or(&Cell::Empty)
    }
}

/// 1900 날짜 체계 일련번호 → 날짜 (1899-12-30 기준, 1900-02-29 버그 보정 포함)
///
/// CSV에서 숫자로 읽힌 YYYYMMDD 정수도 날짜로 해석한다.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    if serial >= 10_000_101.0 && serial.fract() == 0.0 {
        return NaiveDate::parse_from_str(&format!("{}", serial as i64), "%Y%m%d").ok();
    }
    if serial > 2_958_465.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// 날짜 문자열 해석. 시간대가 붙은 값은 UTC 날짜로 변환
pub fn parse_date_str(value: &str) -> Option<NaiveDate> {
    parse_datetime_str(value).map(|dt| dt.date())
}

/// 날짜/시각 문자열을 UTC 기준 `NaiveDateTime`으로 해석
pub fn parse_datetime_str(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_excel_serial() {
        assert_eq!(excel_serial_to_date(43831.0), Some(ymd(2020, 1, 1)));
        assert_eq!(excel_serial_to_date(43831.75), Some(ymd(2020, 1, 1)));
        assert_eq!(excel_serial_to_date(-3.0), None);
        assert_eq!(excel_serial_to_date(20200103.0), Some(ymd(2020, 1, 3)));
    }

    #[test]
    fn test_date_strings() {
        assert_eq!(parse_date_str("2020-01-03"), Some(ymd(2020, 1, 3)));
        assert_eq!(parse_date_str(" 2020/01/03 "), Some(ymd(2020, 1, 3)));
        assert_eq!(parse_date_str("2020-01-03 15:30:00"), Some(ymd(2020, 1, 3)));
        assert_eq!(parse_date_str("01/03/2020"), Some(ymd(2020, 1, 3)));
        assert_eq!(parse_date_str("not a date"), None);
    }

    #[test]
    fn test_offset_is_converted_to_utc() {
        // 서울 시각 새벽 3시 = 전날 UTC 18시
        assert_eq!(
            parse_date_str("2020-01-03T03:00:00+09:00"),
            Some(ymd(2020, 1, 2))
        );
        assert_eq!(
            parse_date_str("2020-01-03 03:00:00+0900"),
            Some(ymd(2020, 1, 2))
        );
    }

    #[test]
    fn test_headers_are_trimmed() {
        let sheet = RawSheet::new("Brent", vec![" Date".into(), "Close ".into()], Vec::new());
        assert_eq!(sheet.column_index("Date"), Some(0));
        assert_eq!(sheet.column_index("Close"), Some(1));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Number(1.5).to_text(), Some("1.5".to_string()));
        assert_eq!(Cell::Text("  ".into()).to_text(), None);
        assert!(Cell::Number(f64::NAN).is_empty());
    }
}
