// Small dev utility: count rows and list declared columns per table in a dump file.
//
// Usage:
//   cargo run --bin inspect_dump -- <volcado.sql> [table...]
//
// Without table arguments it inspects the default configured tables.

use socios_import::domain::default_table_specs;
use socios_import::dump::DumpParser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let dump_path = args.next().ok_or("用法: inspect_dump <volcado.sql> [表名...]")?;

    let tables: Vec<String> = {
        let named: Vec<String> = args.map(|t| t.to_lowercase()).collect();
        if named.is_empty() {
            default_table_specs()
                .into_iter()
                .map(|spec| spec.source_table)
                .collect()
        } else {
            named
        }
    };

    let parser = DumpParser::new(&dump_path);
    println!("转储文件: {}", dump_path);

    for table in &tables {
        let mut rows: u64 = 0;
        let mut columns: Option<Vec<String>> = None;
        for item in parser.scan_table(table)? {
            let row = item?;
            rows += 1;
            if columns.is_none() {
                columns = row.columns.as_ref().map(|c| c.to_vec());
            }
        }
        match columns {
            Some(cols) => println!("{}: {} 行, 列: [{}]", table, rows, cols.join(", ")),
            None => println!("{}: {} 行, 列: (语句未声明)", table, rows),
        }
    }
    Ok(())
}
