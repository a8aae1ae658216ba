use clap::Parser;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const CATEGORIES: [&str; 14] = [
    "bed_bath_table",
    "health_beauty",
    "sports_leisure",
    "furniture_decor",
    "computers_accessories",
    "housewares",
    "watches_gifts",
    "telephony",
    "garden_tools",
    "auto",
    "toys",
    "cool_stuff",
    "perfumery",
    "books_general_interest",
];

/// Write a synthetic product CSV using the dashboard's column layout
#[derive(Parser, Debug)]
struct Args {
    /// Output file
    #[arg(short, long, default_value = "data/product_final.csv")]
    output: PathBuf,

    /// Number of product rows
    #[arg(short, long, default_value_t = 100_000)]
    rows: usize,

    /// Share of rows with one blank required field
    #[arg(long, default_value_t = 0.01)]
    blank_ratio: f64,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let file = File::create(&args.output)?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "product_id,product_category_name_english,product_name_lenght,product_description_lenght,\
         product_photos_qty,product_weight_g,product_length_cm,product_height_cm,product_width_cm"
    )?;

    let mut rng = rand::rng();
    for i in 0..args.rows {
        let mut fields = [
            CATEGORIES[rng.random_range(0..CATEGORIES.len())].to_string(),
            rng.random_range(1..=10).to_string(),
            rng.random_range(7..=105).to_string(),
            rng.random_range(7..=65).to_string(),
            rng.random_range(2..=105).to_string(),
        ];
        if rng.random_bool(args.blank_ratio.clamp(0.0, 1.0)) {
            fields[rng.random_range(0..fields.len())].clear();
        }
        let [category, photos, length, height, width] = fields;

        writeln!(
            writer,
            "p{:08},{},{},{},{},{},{},{},{}",
            i,
            category,
            rng.random_range(5..=76),
            rng.random_range(4..=3992),
            photos,
            rng.random_range(50..=30000),
            length,
            height,
            width
        )?;
    }
    writer.flush()?;

    println!("Sample CSV generated: {}", args.output.display());
    Ok(())
}
