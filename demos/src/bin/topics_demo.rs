use clap::Parser;
use ndarray::Array2;
use plotters::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use semmap_rs::LayoutContext;
use semmap_rs::SemanticLayout;
use semmap_rs::SemanticLayoutConfig;
use semmap_rs::SparseVector;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "Semantic map demo")]
struct Args {
  /// Number of synthetic documents
  #[arg(short, long, default_value = "2000")]
  documents: usize,

  /// Number of topics the documents are drawn from (max 10 colors)
  #[arg(short, long, default_value = "6")]
  topics: usize,

  /// Number of landmarks
  #[arg(short, long, default_value = "50")]
  landmarks: usize,

  /// Terms drawn per document
  #[arg(long, default_value = "12")]
  terms: usize,

  /// Probability that a term comes from another topic
  #[arg(long, default_value = "0.15")]
  noise: f64,

  /// Seed for both data generation and layout
  #[arg(short, long, default_value = "1")]
  seed: u64,

  /// Output PNG path
  #[arg(short, long, default_value = "semantic_map.png")]
  output: String,
}

const VOCAB_PER_TOPIC: u32 = 200;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  info!(
    documents = args.documents,
    topics = args.topics,
    landmarks = args.landmarks,
    seed = args.seed,
    "semantic map demo"
  );

  let started = Instant::now();
  let (documents, labels) = generate_documents(&args)?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    "documents generated"
  );

  let mut config = SemanticLayoutConfig::default();
  config.seed = args.seed;
  config.landmarks.n_landmarks = args.landmarks;

  let layout = SemanticLayout::new(config);
  let mut ctx = LayoutContext::new(args.seed);
  let started = Instant::now();
  let result = layout.compute_layout(&documents, &mut ctx)?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    isolated = result.isolated().len(),
    x_iterations = result.x_report().iterations,
    y_iterations = result.y_report().iterations,
    "layout computed"
  );

  plot_layout(result.positions(), &labels, &args.output)?;
  info!(output = %args.output, "plot written");
  Ok(())
}

/// Documents as bags of weighted terms. Each topic owns a disjoint slice of
/// the vocabulary; with probability `noise` a term is drawn from a random
/// other topic instead.
fn generate_documents(args: &Args) -> Result<(Vec<SparseVector>, Vec<usize>), Box<dyn std::error::Error>> {
  let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
  let topics = args.topics.max(1);
  let mut documents = Vec::with_capacity(args.documents);
  let mut labels = Vec::with_capacity(args.documents);

  for _ in 0..args.documents {
    let topic = rng.random_range(0..topics);
    let mut terms: Vec<(u32, f64)> = Vec::with_capacity(args.terms);
    for _ in 0..args.terms {
      let source = if rng.random::<f64>() < args.noise {
        rng.random_range(0..topics)
      } else {
        topic
      };
      // Zipf-like: low term ids within a topic are more frequent.
      let rank = (rng.random::<f64>().powi(3) * VOCAB_PER_TOPIC as f64) as u32;
      let term = source as u32 * VOCAB_PER_TOPIC + rank.min(VOCAB_PER_TOPIC - 1);
      match terms.iter_mut().find(|(t, _)| *t == term) {
        Some((_, count)) => *count += 1.0,
        None => terms.push((term, 1.0)),
      }
    }
    documents.push(SparseVector::from_pairs(terms)?);
    labels.push(topic);
  }

  Ok((documents, labels))
}

/// Scatter plot colored by topic.
fn plot_layout(
  positions: &Array2<f64>,
  labels: &[usize],
  output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
  let root = BitMapBackend::new(output_path, (1024, 1024)).into_drawing_area();
  root.fill(&WHITE)?;

  let xs = positions.column(0);
  let ys = positions.column(1);
  let x_min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
  let x_max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let y_min = ys.iter().cloned().fold(f64::INFINITY, f64::min);
  let y_max = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let x_padding = ((x_max - x_min) * 0.05).max(1e-3);
  let y_padding = ((y_max - y_min) * 0.05).max(1e-3);

  let mut chart = ChartBuilder::on(&root)
    .caption("Semantic map of synthetic topics", ("sans-serif", 40).into_font())
    .margin(10)
    .x_label_area_size(40)
    .y_label_area_size(50)
    .build_cartesian_2d(
      x_min - x_padding..x_max + x_padding,
      y_min - y_padding..y_max + y_padding,
    )?;

  chart.configure_mesh().draw()?;

  let colors = [
    RGBColor(228, 26, 28),
    RGBColor(55, 126, 184),
    RGBColor(77, 175, 74),
    RGBColor(152, 78, 163),
    RGBColor(255, 127, 0),
    RGBColor(255, 255, 51),
    RGBColor(166, 86, 40),
    RGBColor(247, 129, 191),
    RGBColor(153, 153, 153),
    RGBColor(0, 0, 0),
  ];

  chart.draw_series(
    positions
      .rows()
      .into_iter()
      .zip(labels)
      .map(|(row, &label)| Circle::new((row[0], row[1]), 2, colors[label % colors.len()].filled())),
  )?;

  let topics = labels.iter().copied().max().map_or(0, |m| m + 1);
  for (i, &color) in colors.iter().enumerate().take(topics) {
    chart
      .draw_series(std::iter::once(Circle::new((x_min, y_min), 0, color.filled())))?
      .label(format!("Topic {i}"))
      .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
  }

  chart
    .configure_series_labels()
    .border_style(&BLACK)
    .background_style(&WHITE.mix(0.8))
    .position(SeriesLabelPosition::UpperRight)
    .draw()?;

  root.present()?;
  Ok(())
}
