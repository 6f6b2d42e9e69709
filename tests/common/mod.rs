//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

const DIRECTORS: [&str; 6] = [
    "Ridley Scott",
    "Kathryn Bigelow",
    "Ang Lee",
    "Greta Gerwig",
    "Bong Joon-ho",
    "Denis Villeneuve",
];
const ACTORS: [&str; 8] = [
    "Tilda Swinton",
    "Idris Elba",
    "Cate Blanchett",
    "Mahershala Ali",
    "Song Kang-ho",
    "Frances McDormand",
    "Oscar Isaac",
    "Viola Davis",
];
const GENRES: [&str; 4] = ["Action", "Drama", "Comedy|Romance", "Sci-Fi|Thriller"];
const RATINGS: [&str; 4] = ["G", "PG", "PG-13", "R"];
const LANGUAGES: [&str; 3] = ["English", "French", "Korean"];
const COUNTRIES: [&str; 3] = ["USA", "UK", "South Korea"];
const KEYWORDS: [&str; 5] = ["heist", "space", "family", "revenge", "friendship"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

/// Occasionally drop a value, with probability `p`
fn maybe<T>(rng: &mut StdRng, p: f64, value: T) -> Option<T> {
    if rng.gen::<f64>() < p {
        None
    } else {
        Some(value)
    }
}

/// Synthetic movie-metadata table with every column the default schema
/// expects. Gross grows with budget, critic reviews and IMDb score; roughly
/// 5% of the imputed cells are missing.
pub fn create_movie_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut budget = Vec::with_capacity(rows);
    let mut gross = Vec::with_capacity(rows);
    let mut duration = Vec::with_capacity(rows);
    let mut critics = Vec::with_capacity(rows);
    let mut year = Vec::with_capacity(rows);
    let mut director_likes = Vec::with_capacity(rows);
    let mut actor3_likes = Vec::with_capacity(rows);
    let mut aspect = Vec::with_capacity(rows);
    let mut imdb = Vec::with_capacity(rows);
    let mut movie_likes = Vec::with_capacity(rows);
    let mut cast_likes = Vec::with_capacity(rows);
    let mut color = Vec::with_capacity(rows);
    let mut language = Vec::with_capacity(rows);
    let mut country = Vec::with_capacity(rows);
    let mut director = Vec::with_capacity(rows);
    let mut actor1 = Vec::with_capacity(rows);
    let mut actor2 = Vec::with_capacity(rows);
    let mut actor3 = Vec::with_capacity(rows);
    let mut keywords = Vec::with_capacity(rows);
    let mut rating = Vec::with_capacity(rows);
    let mut genres = Vec::with_capacity(rows);

    for _ in 0..rows {
        let b: f64 = rng.gen_range(1.0e6..2.0e8);
        let c: f64 = rng.gen_range(10.0..600.0);
        let score: f64 = rng.gen_range(3.0..9.0);
        let noise: f64 = rng.gen_range(-5.0e6..5.0e6);
        let g = 1.5 * b + 8.0e4 * c + 4.0e6 * score + noise;

        let d: f64 = rng.gen_range(80.0..180.0);
        let y = rng.gen_range(1980..2016) as f64;
        let dl: f64 = rng.gen_range(0.0..20_000.0);
        let al: f64 = rng.gen_range(0.0..5_000.0);
        let ar = if rng.gen_bool(0.5) { 1.85 } else { 2.35 };

        budget.push(maybe(&mut rng, 0.05, b));
        gross.push(maybe(&mut rng, 0.05, g.max(1.0e5)));
        duration.push(maybe(&mut rng, 0.05, d));
        critics.push(maybe(&mut rng, 0.05, c));
        year.push(maybe(&mut rng, 0.02, y));
        director_likes.push(maybe(&mut rng, 0.05, dl));
        actor3_likes.push(maybe(&mut rng, 0.05, al));
        aspect.push(maybe(&mut rng, 0.05, ar));
        imdb.push(score);
        movie_likes.push(rng.gen_range(0.0..100_000.0));
        cast_likes.push(rng.gen_range(0.0..50_000.0));

        let col = if rng.gen_bool(0.9) { "Color" } else { "Black and White" };
        color.push(maybe(&mut rng, 0.03, col.to_string()));
        let lang = pick(&mut rng, &LANGUAGES);
        language.push(maybe(&mut rng, 0.03, lang.to_string()));
        country.push(pick(&mut rng, &COUNTRIES).to_string());
        let dir = pick(&mut rng, &DIRECTORS);
        director.push(maybe(&mut rng, 0.03, dir.to_string()));
        let a1 = pick(&mut rng, &ACTORS);
        actor1.push(maybe(&mut rng, 0.03, a1.to_string()));
        let a2 = pick(&mut rng, &ACTORS);
        actor2.push(maybe(&mut rng, 0.03, a2.to_string()));
        let a3 = pick(&mut rng, &ACTORS);
        actor3.push(maybe(&mut rng, 0.03, a3.to_string()));
        let kw = pick(&mut rng, &KEYWORDS);
        keywords.push(maybe(&mut rng, 0.03, kw.to_string()));
        let r = pick(&mut rng, &RATINGS);
        rating.push(maybe(&mut rng, 0.03, r.to_string()));
        genres.push(pick(&mut rng, &GENRES).to_string());
    }

    df! {
        "color" => color,
        "director_name" => director,
        "num_critic_for_reviews" => critics,
        "duration" => duration,
        "director_facebook_likes" => director_likes,
        "actor_3_facebook_likes" => actor3_likes,
        "actor_2_name" => actor2,
        "gross" => gross,
        "genres" => genres,
        "actor_1_name" => actor1,
        "actor_3_name" => actor3,
        "plot_keywords" => keywords,
        "language" => language,
        "country" => country,
        "content_rating" => rating,
        "budget" => budget,
        "title_year" => year,
        "imdb_score" => imdb,
        "aspect_ratio" => aspect,
        "movie_facebook_likes" => movie_likes,
        "cast_total_facebook_likes" => cast_likes,
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("movies.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("movies.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame has no null cells left
pub fn assert_no_nulls(df: &DataFrame) {
    for column in df.get_columns() {
        assert_eq!(
            column.null_count(),
            0,
            "Column '{}' still has nulls",
            column.name()
        );
    }
}
