//! .xlsx persistence tests: write_file/read_file and workbook round trips

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use royalbit_sheetmap::{
    read_file, record, write_file, BoxError, CellStyle, CellValue, DecodeOptions, EncodeOptions,
    SheetBackend, SheetError, Validation, Workbook,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Employee {
        #[tag(excel = "id")]
        pub id: i64,
        #[tag(excel = "name")]
        pub name: String,
        #[tag(excel = "active")]
        pub active: bool,
        #[tag(excel = "rate")]
        pub rate: f64,
        #[tag(excel = "joined")]
        pub joined: NaiveDateTime,
        #[tag(excel = "skills")]
        pub skills: Vec<String>,
        #[tag(excel = "manager,omitempty")]
        pub manager: Option<i64>,
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Department {
        #[tag(excel = "code")]
        pub code: String,
    }
}

record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Counter {
        #[tag(excel = "small")]
        pub small: i64,
        #[tag(excel = "signed")]
        pub signed: i64,
        #[tag(excel = "unsigned")]
        pub unsigned: u64,
    }
}

fn staff() -> Vec<Employee> {
    vec![
        Employee {
            id: 1,
            name: "Ada".to_string(),
            active: true,
            rate: 12.75,
            joined: NaiveDate::from_ymd_opt(2021, 5, 17)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            skills: vec!["math".to_string(), "engines".to_string()],
            manager: None,
        },
        Employee {
            id: 2,
            name: "Grace".to_string(),
            active: false,
            rate: 10.0,
            joined: NaiveDate::from_ymd_opt(2019, 1, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            skills: vec!["cobol".to_string()],
            manager: Some(1),
        },
    ]
}

#[test]
fn test_write_then_read_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("staff.xlsx");

    let title = write_file(&path, &staff(), EncodeOptions::default()).unwrap();
    assert_eq!(title.columns("skills"), Some(&[6, 7][..]));
    assert!(path.exists());

    let back: Vec<Employee> = read_file(&path, DecodeOptions::default()).unwrap();
    assert_eq!(back, staff());
}

#[test]
fn test_large_integers_survive_xlsx() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("counters.xlsx");
    let counters = vec![
        Counter {
            small: 42,
            signed: i64::MIN,
            unsigned: u64::MAX,
        },
        Counter {
            small: -7,
            signed: (1 << 53) + 1,
            unsigned: (1 << 53) + 1,
        },
    ];

    write_file(&path, &counters, EncodeOptions::default()).unwrap();
    let back: Vec<Counter> = read_file(&path, DecodeOptions::default()).unwrap();
    assert_eq!(back, counters);
}

#[test]
fn test_other_sheets_are_kept() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.xlsx");

    let departments = vec![
        Department {
            code: "ENG".to_string(),
        },
        Department {
            code: "OPS".to_string(),
        },
    ];
    let dept_title = write_file(
        &path,
        &departments,
        EncodeOptions::default().with_sheet("Departments"),
    )
    .unwrap();
    let source = dept_title.sqref("code").unwrap();
    assert_eq!(source, "Departments!$A$2:$A$3");

    // staff sheet validates against the departments list
    let rule_source = source.clone();
    let opts = EncodeOptions {
        data_validation: Some(Arc::new(move |title: &str| -> Result<Option<Validation>, BoxError> {
            Ok((title == "name").then(|| Validation::ListSource {
                range: rule_source.clone(),
            }))
        })),
        cell_style: Some(CellStyle {
            border: true,
            ..Default::default()
        }),
        title_style: HashMap::from([("id".to_string(), "head".to_string())]),
        styles: HashMap::from([(
            "head".to_string(),
            CellStyle {
                bold: true,
                fill_color: Some(0xDDEBF7),
                ..Default::default()
            },
        )]),
        ..EncodeOptions::default().with_sheet("Staff")
    };
    write_file(&path, &staff(), opts).unwrap();

    let book = Workbook::open(&path).unwrap();
    assert_eq!(book.sheet_names(), vec!["Departments", "Staff"]);
    assert_eq!(book.cell_text("Departments", 3, 1), "OPS");

    let back: Vec<Employee> = read_file(&path, DecodeOptions::default().with_sheet("Staff")).unwrap();
    assert_eq!(back, staff());
}

#[test]
fn test_workbook_save_and_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cells.xlsx");

    let mut book = Workbook::new();
    book.ensure_sheet("Raw").unwrap();
    book.write_cell("Raw", 1, 1, CellValue::from("label")).unwrap();
    book.write_cell("Raw", 1, 2, CellValue::Int(-4)).unwrap();
    book.write_cell("Raw", 2, 1, CellValue::Bool(true)).unwrap();
    book.write_cell("Raw", 2, 3, CellValue::Float(0.25)).unwrap();
    book.set_col_width("Raw", 1, 14.0).unwrap();
    book.add_validation("Raw", "B1:B4", &Validation::Decimal { min: -5.0, max: 5.0 })
        .unwrap();
    book.save(&path).unwrap();

    let back = Workbook::open(&path).unwrap();
    assert_eq!(
        back.rows_of("Raw").unwrap(),
        vec![
            vec!["label".to_string(), "-4".to_string()],
            vec!["TRUE".to_string(), String::new(), "0.25".to_string()],
        ]
    );
}

#[test]
fn test_open_or_create_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.xlsx");
    let book = Workbook::open_or_create(&path).unwrap();
    assert!(book.sheet_names().is_empty());
}

#[test]
fn test_read_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let err = read_file::<Employee>(dir.path().join("nope.xlsx"), DecodeOptions::default())
        .unwrap_err();
    assert!(matches!(err, SheetError::Import(_)));
}
