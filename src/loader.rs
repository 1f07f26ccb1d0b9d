use polars::prelude::*;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::TabError;
use crate::schema::{Value, ValueType};
use crate::table::{ID_KEY, Record, TableSnapshot};

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// A loaded file, ready to be handed to `TableModel::load`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub filename: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

/// Reads a data file completely before anything is returned, so a failure never
/// leaves a partially loaded dataset behind.
pub fn load_dataset(path: &Path) -> Result<Dataset, TabError> {
    let file_info = get_file_info(path.to_path_buf())?;
    debug!(
        "Loading {:?} ({} bytes) as {:?}",
        file_info.path, file_info.file_size, file_info.file_type
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    // Each column is converted in its own thread
    let values: Result<Vec<Vec<Value>>, PolarsError> = columns
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let values = values?;

    let mut records: Vec<Record> = (0..df.height())
        .map(|_| Record::with_capacity(columns.len()))
        .collect();
    for (name, column) in columns.iter().zip(values) {
        for (record, value) in records.iter_mut().zip(column) {
            record.insert(name.clone(), value);
        }
    }

    info!(
        "Loading data took {}ms, {} rows, {} columns",
        start_time.elapsed().as_millis(),
        records.len(),
        columns.len()
    );

    let filename = file_info
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    Ok(Dataset {
        filename,
        columns,
        records,
    })
}

/// Writes the row identity followed by every data column as CSV.
pub fn export_csv(snapshot: &TableSnapshot, path: &Path) -> Result<(), TabError> {
    let schema = snapshot.schema();
    let records = snapshot.records();

    let mut frame_columns: Vec<Column> = Vec::with_capacity(schema.len() + 1);
    frame_columns.push(export_column(ID_KEY, ValueType::String, &records));
    for column in schema.columns() {
        frame_columns.push(export_column(&column.name, column.value_type, &records));
    }

    let mut df = DataFrame::new(frame_columns)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    info!("Exported {} rows to {:?}", snapshot.len(), path);
    Ok(())
}

fn export_column(name: &str, value_type: ValueType, records: &[Record]) -> Column {
    let cells: Vec<Option<&Value>> = records
        .iter()
        .map(|r| r.get(name).filter(|v| !v.is_null()))
        .collect();
    // Cells of another type would be lost in a typed column, fall back to text
    let uniform = cells.iter().flatten().all(|v| v.kind() == value_type);
    if !uniform {
        debug!("Column \"{name}\" holds mixed types, exporting as text");
    }

    let name: PlSmallStr = name.into();
    match value_type {
        ValueType::Boolean if uniform => Column::new(
            name,
            cells
                .iter()
                .map(|v| v.and_then(Value::as_bool))
                .collect::<Vec<Option<bool>>>(),
        ),
        ValueType::Number if uniform => Column::new(
            name,
            cells
                .iter()
                .map(|v| v.and_then(Value::as_f64))
                .collect::<Vec<Option<f64>>>(),
        ),
        _ => Column::new(
            name,
            cells
                .iter()
                .map(|v| v.map(Value::to_string))
                .collect::<Vec<Option<String>>>(),
        ),
    }
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(col_name)?;
    let dtype = column.dtype().clone();

    let values = if dtype == DataType::Boolean {
        column
            .bool()?
            .into_iter()
            .map(|v| v.map(Value::Boolean).unwrap_or_default())
            .collect()
    } else if is_numeric_type(&dtype) {
        let col = column.cast(&DataType::Float64)?;
        col.f64()?
            .into_iter()
            .map(|v| v.map(Value::Number).unwrap_or_default())
            .collect()
    } else {
        let col = column.cast(&DataType::String)?;
        col.str()?
            .into_iter()
            .map(|v| v.map(|s| Value::String(s.to_string())).unwrap_or_default())
            .collect()
    };
    debug!("Column \"{col_name}\": {dtype}");
    Ok(values)
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn detect_file_type(path: &Path) -> Result<FileType, TabError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TabError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TabError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TabError::FileNotFound,
        ErrorKind::PermissionDenied => TabError::PermissionDenied,
        _ => TabError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TabError::LoadingFailed("Not a file!".into()));
    }

    let file_size = metadata.len();
    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size,
        file_type,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}
