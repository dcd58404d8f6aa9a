//! Parquet source
//!
//! Integers, floats and booleans keep their type. String columns become
//! text and list columns become `Cell::List`. Anything else (timestamps,
//! decimals, dictionaries) is rendered through arrow's display formatter
//! and left for normalization.

use std::fs::File;
use std::path::Path;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use crate::Result;
use super::{Cell, Frame};

const READ_BATCH_SIZE: usize = 8192;

pub fn read_parquet(path: &Path) -> Result<Frame> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(READ_BATCH_SIZE);
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    let reader = builder.build()?;

    let mut frame = Frame::new(columns);
    for batch in reader {
        let batch = batch?;
        let mut column_cells = batch
            .columns()
            .iter()
            .map(column_to_cells)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(Vec::into_iter)
            .collect::<Vec<_>>();

        for _ in 0..batch.num_rows() {
            let row = column_cells
                .iter_mut()
                .map(|col| col.next().unwrap_or(Cell::Null))
                .collect();
            frame.push_row(row);
        }
    }
    Ok(frame)
}

fn column_to_cells(array: &ArrayRef) -> Result<Vec<Cell>> {
    let len = array.len();
    let cells = match array.data_type() {
        DataType::Null => vec![Cell::Null; len],
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let ints = cast(array, &DataType::Int64)?;
            let ints = ints.as_primitive::<Int64Type>();
            (0..len)
                .map(|i| if ints.is_null(i) { Cell::Null } else { Cell::Int(ints.value(i)) })
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(array, &DataType::Float64)?;
            let floats = floats.as_primitive::<Float64Type>();
            (0..len)
                .map(|i| if floats.is_null(i) { Cell::Null } else { Cell::Float(floats.value(i)) })
                .collect()
        }
        DataType::Boolean => {
            let bools = array.as_boolean();
            (0..len)
                .map(|i| if bools.is_null(i) { Cell::Null } else { Cell::Bool(bools.value(i)) })
                .collect()
        }
        DataType::Utf8 => {
            let strings = array.as_string::<i32>();
            (0..len)
                .map(|i| text_cell(strings.is_null(i), || strings.value(i)))
                .collect()
        }
        DataType::LargeUtf8 => {
            let strings = array.as_string::<i64>();
            (0..len)
                .map(|i| text_cell(strings.is_null(i), || strings.value(i)))
                .collect()
        }
        DataType::List(_) => {
            let lists = array.as_list::<i32>();
            (0..len)
                .map(|i| if lists.is_null(i) { Ok(Cell::Null) } else { list_cell(&lists.value(i)) })
                .collect::<Result<_>>()?
        }
        DataType::LargeList(_) => {
            let lists = array.as_list::<i64>();
            (0..len)
                .map(|i| if lists.is_null(i) { Ok(Cell::Null) } else { list_cell(&lists.value(i)) })
                .collect::<Result<_>>()?
        }
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            (0..len)
                .map(|i| {
                    if array.is_null(i) {
                        Cell::Null
                    } else {
                        Cell::Text(formatter.value(i).to_string())
                    }
                })
                .collect()
        }
    };
    Ok(cells)
}

fn text_cell<'a>(is_null: bool, value: impl FnOnce() -> &'a str) -> Cell {
    if is_null {
        return Cell::Null;
    }
    let value = value();
    if value.trim().is_empty() {
        Cell::Null
    } else {
        Cell::Text(value.to_string())
    }
}

fn list_cell(values: &ArrayRef) -> Result<Cell> {
    let formatter = ArrayFormatter::try_new(values.as_ref(), &FormatOptions::default())?;
    let items = (0..values.len())
        .filter(|&i| !values.is_null(i))
        .map(|i| formatter.value(i).to_string())
        .collect();
    Ok(Cell::List(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use arrow::array::{Int32Array, ListBuilder, RecordBatch, StringArray, StringBuilder};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    fn write_fixture(path: &Path) {
        let mut labels = ListBuilder::new(StringBuilder::new());
        labels.values().append_value("bug");
        labels.values().append_value("ui");
        labels.append(true);
        labels.append(false);
        let labels = labels.finish();

        let schema = Arc::new(Schema::new(vec![
            Field::new("ID", DataType::Int32, false),
            Field::new("TITLE", DataType::Utf8, true),
            Field::new("LABELS", labels.data_type().clone(), true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("Crash on start"), None])),
                Arc::new(labels),
            ],
        )
        .unwrap();

        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_read_typed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.parquet");
        write_fixture(&path);

        let frame = read_parquet(&path).unwrap();
        assert_eq!(frame.columns(), &["ID", "TITLE", "LABELS"]);
        assert_eq!(frame.len(), 2);

        let rows: Vec<_> = frame.records().collect();
        assert_eq!(rows[0].cell("ID"), &Cell::Int(1));
        assert_eq!(rows[0].text("TITLE").as_deref(), Some("Crash on start"));
        assert_eq!(rows[0].list("LABELS"), vec!["bug", "ui"]);
        assert_eq!(rows[1].cell("TITLE"), &Cell::Null);
        assert!(rows[1].list("LABELS").is_empty());
    }
}
