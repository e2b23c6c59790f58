use anyhow::Result;

fn main() -> Result<()> {
    let book = umya_spreadsheet::new_file();

    // One empty worksheet, nothing else: the shape sheetrows expects as a template.
    umya_spreadsheet::writer::xlsx::write(&book, "Sample.xlsx")?;
    println!("Wrote Sample.xlsx");
    Ok(())
}
