//! 날짜 인덱스를 가진 컬럼 지향 관측 테이블
//!
//! 컬럼 이름 목록과 타입이 있는 컬럼 저장소를 함께 들고 다니므로,
//! 존재하지 않는 컬럼 참조는 조인/선택 시점에 `MissingColumn` 오류가 된다.

use chrono::NaiveDate;

use crate::utility::errors::{PipelineError, PipelineResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Column::Numeric(values) => values[row].is_none(),
            Column::Text(values) => values[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    /// 지정한 행만 순서대로 모은 컬럼
    pub fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(values) => Column::Numeric(rows.iter().map(|&i| values[i]).collect()),
            Column::Text(values) => {
                Column::Text(rows.iter().map(|&i| values[i].clone()).collect())
            }
        }
    }

    /// 직전 non-null 값으로 null을 채운다
    pub fn forward_fill(&mut self) {
        match self {
            Column::Numeric(values) => fill_forward(values),
            Column::Text(values) => fill_forward(values),
        }
    }

    /// 직후 non-null 값으로 null을 채운다
    pub fn backward_fill(&mut self) {
        match self {
            Column::Numeric(values) => {
                values.reverse();
                fill_forward(values);
                values.reverse();
            }
            Column::Text(values) => {
                values.reverse();
                fill_forward(values);
                values.reverse();
            }
        }
    }
}

fn fill_forward<T: Clone>(values: &mut [Option<T>]) {
    let mut last: Option<T> = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(v.clone()),
            None => *value = last.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            dates,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_columns(&self) -> usize {
        self.names.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> PipelineResult<&Column> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| PipelineError::missing_column(&self.name, name))
    }

    pub fn column_mut(&mut self, name: &str) -> PipelineResult<&mut Column> {
        match self.position(name) {
            Some(i) => Ok(&mut self.columns[i]),
            None => Err(PipelineError::missing_column(&self.name, name)),
        }
    }

    /// 숫자 컬럼 값. 텍스트 컬럼이면 검증 오류
    pub fn numeric(&self, name: &str) -> PipelineResult<&[Option<f64>]> {
        match self.column(name)? {
            Column::Numeric(values) => Ok(values),
            Column::Text(_) => Err(PipelineError::validation(
                name,
                format!("{} 테이블에서 숫자 컬럼이 아닙니다", self.name),
            )),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(&self.columns)
    }

    /// 새 컬럼 추가. 길이가 다르거나 같은 이름이 이미 있으면 오류
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> PipelineResult<()> {
        let name = name.into();
        if column.len() != self.n_rows() {
            return Err(PipelineError::validation(
                &name,
                format!("컬럼 길이 {} != 테이블 행 수 {}", column.len(), self.n_rows()),
            ));
        }
        if self.has_column(&name) {
            return Err(PipelineError::validation(
                &name,
                format!("{} 테이블에 이미 같은 이름의 컬럼이 있습니다", self.name),
            ));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// 같은 이름이 있으면 교체, 없으면 끝에 추가
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> PipelineResult<()> {
        let name = name.into();
        match self.position(&name) {
            Some(i) if column.len() == self.n_rows() => {
                self.columns[i] = column;
                Ok(())
            }
            Some(_) => Err(PipelineError::validation(
                &name,
                format!("컬럼 길이 {} != 테이블 행 수 {}", column.len(), self.n_rows()),
            )),
            None => self.push_column(name, column),
        }
    }

    /// 지정한 행만 순서대로 모은 새 테이블
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
        }
    }

    pub fn forward_fill(&mut self) {
        self.columns.iter_mut().for_each(Column::forward_fill);
    }

    pub fn backward_fill(&mut self) {
        self.columns.iter_mut().for_each(Column::backward_fill);
    }

    /// 전체 null 개수
    pub fn null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
            .collect()
    }

    #[test]
    fn test_missing_column_is_error() {
        let table = Table::new("unified", dates(2));
        assert!(matches!(
            table.column("Brent_Close"),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_push_column_checks_length_and_name() {
        let mut table = Table::new("t", dates(2));
        table
            .push_column("a", Column::Numeric(vec![Some(1.0), None]))
            .unwrap();
        assert!(table
            .push_column("b", Column::Numeric(vec![Some(1.0)]))
            .is_err());
        assert!(table
            .push_column("a", Column::Numeric(vec![None, None]))
            .is_err());
    }

    #[test]
    fn test_forward_then_backward_fill() {
        let mut table = Table::new("t", dates(5));
        table
            .push_column("x", Column::Numeric(vec![None, Some(2.0), None, Some(4.0), None]))
            .unwrap();
        table
            .push_column(
                "s",
                Column::Text(vec![None, None, Some("up".into()), None, None]),
            )
            .unwrap();
        table.push_column("empty", Column::Numeric(vec![None; 5])).unwrap();

        table.forward_fill();
        table.backward_fill();

        assert_eq!(
            table.numeric("x").unwrap(),
            &[Some(2.0), Some(2.0), Some(2.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(table.column("s").unwrap().null_count(), 0);
        assert_eq!(table.column("empty").unwrap().null_count(), 5);
    }

    #[test]
    fn test_select_rows() {
        let mut table = Table::new("t", dates(3));
        table
            .push_column("x", Column::Numeric(vec![Some(1.0), Some(2.0), Some(3.0)]))
            .unwrap();
        let picked = table.select_rows(&[2, 0]);
        assert_eq!(picked.dates()[0], NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        assert_eq!(picked.numeric("x").unwrap(), &[Some(3.0), Some(1.0)]);
    }
}
