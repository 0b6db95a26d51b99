use clap::{ArgGroup, Parser, ValueEnum};
use eigen_pca::regression::{mean_squared_error, r2_score};
use eigen_pca::scree::render_scree;
use eigen_pca::{
    train_test_split, ComponentSelection, LinearRegression, MissingValuePolicy, PcaConfig, Table, PCA,
};
use log::{info, warn};
use ndarray::{Array1, Array2, ArrayView2};
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const SCREE_WIDTH: usize = 40;

/// Standardize a numeric table, fit PCA on a training split and project both splits
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("selection").args(["components", "variance"])))]
#[command(group(ArgGroup::new("split").args(["test_fraction", "no_split"])))]
struct Cli {
    /// Delimited text file with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// TOML file with default settings; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column excluded from the features (the regression target)
    #[arg(short, long)]
    target: Option<String>,

    /// Field delimiter
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Keep the top k components
    #[arg(short = 'k', long)]
    components: Option<usize>,

    /// Keep the fewest components reaching this explained variance ratio
    #[arg(short, long)]
    variance: Option<f64>,

    /// What to do with rows holding missing values
    #[arg(short, long, value_enum)]
    missing: Option<MissingArg>,

    /// Fraction of rows held out as a test set
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Fit on every row without holding out a test set
    #[arg(long)]
    no_split: bool,

    /// Seed for the train/test shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Write the projected rows (all rows, input order) to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the fitted model (bincode)
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Regress the target on the component scores and report R^2 and MSE
    #[arg(long)]
    regress: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MissingArg {
    Reject,
    DropRows,
    MeanImpute,
}

impl From<MissingArg> for MissingValuePolicy {
    fn from(arg: MissingArg) -> Self {
        match arg {
            MissingArg::Reject => MissingValuePolicy::Reject,
            MissingArg::DropRows => MissingValuePolicy::DropRows,
            MissingArg::MeanImpute => MissingValuePolicy::MeanImpute,
        }
    }
}

fn build_config(cli: &Cli) -> Result<PcaConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => PcaConfig::from_path(path)?,
        None => PcaConfig::default(),
    };
    if let Some(target) = &cli.target {
        config.target_column = Some(target.clone());
    }
    if let Some(delimiter) = &cli.delimiter {
        config.delimiter = delimiter.clone();
    }
    if let Some(k) = cli.components {
        config.selection = ComponentSelection::Count(k);
    }
    if let Some(t) = cli.variance {
        config.selection = ComponentSelection::VarianceThreshold(t);
    }
    if let Some(missing) = cli.missing {
        config.missing_values = missing.into();
    }
    if let Some(fraction) = cli.test_fraction {
        config.test_fraction = fraction;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn write_scores(path: &Path, scores: ArrayView2<f64>) -> Result<(), Box<dyn Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    let header: Vec<String> = (1..=scores.ncols()).map(|i| format!("PC{}", i)).collect();
    writeln!(writer, "{}", header.join(","))?;
    for row in scores.rows() {
        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()?;
    info!("Wrote {} projected rows to {:?}", scores.nrows(), path);
    Ok(())
}

fn print_loadings(headers: &[String], rotation: &Array2<f64>) {
    println!("\nLoadings:");
    for (name, row) in headers.iter().zip(rotation.rows()) {
        let values: Vec<String> = row.iter().map(|v| format!("{:>9.4}", v)).collect();
        println!("{:>16}  {}", name, values.join(" "));
    }
}

fn report_regression(
    train_scores: ArrayView2<f64>,
    y_train: &Array1<f64>,
    eval_scores: ArrayView2<f64>,
    y_eval: &Array1<f64>,
) -> Result<(), Box<dyn Error>> {
    let model = LinearRegression::fit(train_scores, y_train.view())?;
    let predicted = model.predict(eval_scores)?;
    let r2 = r2_score(y_eval.view(), predicted.view())?;
    let mse = mean_squared_error(y_eval.view(), predicted.view())?;
    println!("\nRegression on {} component scores:", train_scores.ncols());
    println!("  intercept  {:.6}", model.intercept());
    println!("  R^2        {:.6}", r2);
    println!("  MSE        {:.6}", mse);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let table = Table::from_path(&cli.input, &config.delimiter)?.handle_missing(config.missing_values)?;
    let (features, target) = match &config.target_column {
        Some(name) => {
            let (features, y) = table.split_target(name)?;
            (features, Some(y))
        }
        None => (table, None),
    };
    if cli.regress && target.is_none() {
        return Err("--regress needs a target column".into());
    }

    let (x_train, x_test, y_train, y_test) = if cli.no_split {
        (features.data().to_owned(), None, target.clone(), None)
    } else {
        let split = train_test_split(
            features.data(),
            target.as_ref().map(|y| y.view()),
            config.test_fraction,
            config.seed,
        )?;
        (split.x_train, Some(split.x_test), split.y_train, split.y_test)
    };

    let mut pca = PCA::new();
    let train_scores = pca.fit_transform(x_train.view(), config.selection)?;
    print!("{}", render_scree(&pca.scree(), SCREE_WIDTH));
    if let (Some(k), Some(cumulative)) = (pca.n_components(), pca.cumulative_explained_variance_ratio()) {
        let retained = cumulative.iter().last().copied().unwrap_or(0.0);
        println!("\nRetained {} of {} components ({:.2}% of variance)", k, features.n_columns(), 100.0 * retained);
    }
    if let Some(rotation) = pca.rotation() {
        print_loadings(features.headers(), rotation);
    }

    let test_scores = match &x_test {
        Some(x) => Some(pca.transform(x.view())?),
        None => None,
    };

    if cli.regress {
        match (&y_train, &test_scores, &y_test) {
            (Some(y_tr), Some(scores), Some(y_te)) => {
                report_regression(train_scores.view(), y_tr, scores.view(), y_te)?
            }
            (Some(y_tr), _, _) => {
                warn!("No test split; regression is evaluated on the training rows");
                report_regression(train_scores.view(), y_tr, train_scores.view(), y_tr)?
            }
            _ => {}
        }
    }

    if let Some(path) = &cli.output {
        let all_scores = pca.transform(features.data())?;
        write_scores(path, all_scores.view())?;
    }
    if let Some(path) = &cli.save_model {
        pca.save_model(path)?;
    }
    Ok(())
}
