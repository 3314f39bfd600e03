use std::io::Read;

/// Parse a transition matrix stored as headerless CSV, one row per line.
/// Lines starting with `#` are ignored.
pub fn load_matrix_csv(path: &str) -> eyre::Result<Vec<Vec<f64>>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("Failed to open matrix CSV '{}': {}", path, e))?;
    let matrix = parse_matrix_csv(file)
        .map_err(|e| eyre::eyre!("Failed to parse matrix CSV '{}': {}", path, e))?;
    tracing::debug!(path, rows = matrix.len(), "Loaded transition matrix");
    Ok(matrix)
}

pub fn parse_matrix_csv<R: Read>(source: R) -> eyre::Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);

    let mut matrix = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                field.parse::<f64>().map_err(|e| {
                    eyre::eyre!("row {}, column {}: '{}' is not a number: {}", row_idx, col, field, e)
                })
            })
            .collect::<eyre::Result<Vec<f64>>>()?;
        matrix.push(row);
    }
    Ok(matrix)
}
