use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use shared::models::{Car, CarUpdate, NewCar, Page};

use super::{Remote, explain, require_session};

#[derive(Subcommand, Debug)]
pub enum CarsCommand {
    /// List a page of the catalog
    List {
        #[command(flatten)]
        page: PageArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Find cars by make, model or description
    Search {
        query: String,
        #[command(flatten)]
        page: PageArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one car
    Show {
        id: i64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add a car to the catalog
    Create(NewCarArgs),
    /// Change fields of a car
    Update {
        id: i64,
        #[command(flatten)]
        changes: CarChangeArgs,
    },
    /// Remove a car from the catalog
    Delete { id: i64 },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    /// Entries to skip
    #[arg(long, default_value_t = 0)]
    pub skip: u32,
    /// Most entries to show
    #[arg(long, default_value_t = Page::DEFAULT_LIMIT)]
    pub limit: u32,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Self::new(args.skip, args.limit)
    }
}

#[derive(Args, Debug)]
pub struct NewCarArgs {
    #[arg(long)]
    pub make: String,
    #[arg(long)]
    pub model: String,
    #[arg(long)]
    pub year: i32,
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long)]
    pub description: Option<String>,
    /// Repeat for each feature
    #[arg(long = "feature")]
    pub features: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CarChangeArgs {
    #[arg(long)]
    pub make: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long)]
    pub description: Option<String>,
    /// Replaces the feature list; repeat for each feature
    #[arg(long = "feature")]
    pub features: Option<Vec<String>>,
}

impl From<NewCarArgs> for NewCar {
    fn from(args: NewCarArgs) -> Self {
        Self {
            make: args.make,
            model: args.model,
            year: args.year,
            price: args.price,
            description: args.description,
            features: args.features,
        }
    }
}

impl From<CarChangeArgs> for CarUpdate {
    fn from(args: CarChangeArgs) -> Self {
        Self {
            make: args.make,
            model: args.model,
            year: args.year,
            price: args.price,
            description: args.description,
            features: args.features,
        }
    }
}

/// Runs a `cars` subcommand behind the session guard.
///
/// # Errors
/// Returns an error without a valid session, or when the backend call fails.
pub async fn run(remote: &Remote, command: CarsCommand) -> Result<()> {
    require_session(remote).await?;
    let cars = remote.app.cars();

    match command {
        CarsCommand::List { page, json } => {
            let listing = cars.list(page.into()).await.map_err(explain)?;
            print_listing(&listing, json, "The catalog is empty.")?;
        }
        CarsCommand::Search { query, page, json } => {
            let found = cars
                .search(&query, page.into())
                .await
                .map_err(explain)
                .with_context(|| format!("search for '{query}' failed"))?;
            print_listing(&found, json, "No cars match.")?;
        }
        CarsCommand::Show { id, json } => {
            let car = cars.get(id).await.map_err(explain)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&car)?);
            } else {
                print_details(&car);
            }
        }
        CarsCommand::Create(args) => {
            let car = cars
                .create(&args.into())
                .await
                .map_err(explain)
                .context("failed to create car")?;
            println!("Created car {}", car.id);
            print_details(&car);
        }
        CarsCommand::Update { id, changes } => {
            let changes = CarUpdate::from(changes);
            if changes.is_empty() {
                bail!("nothing to change; pass at least one field");
            }
            let car = cars
                .update(id, &changes)
                .await
                .map_err(explain)
                .with_context(|| format!("failed to update car {id}"))?;
            print_details(&car);
        }
        CarsCommand::Delete { id } => {
            cars.delete(id)
                .await
                .map_err(explain)
                .with_context(|| format!("failed to delete car {id}"))?;
            println!("Deleted car {id}");
        }
    }
    Ok(())
}

fn print_listing(listing: &[Car], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(listing)?);
    } else if listing.is_empty() {
        println!("{empty}");
    } else {
        for car in listing {
            println!("{}", summary_line(car));
        }
    }
    Ok(())
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "n/a".to_string(), |price| format!("${price:.0}"))
}

fn summary_line(car: &Car) -> String {
    format!(
        "{:>5}  {}  {} {}  {}",
        car.id,
        car.year,
        car.make,
        car.model,
        format_price(car.price)
    )
}

fn print_details(car: &Car) {
    println!("{} {} ({})", car.make, car.model, car.year);
    println!("id: {}", car.id);
    println!("price: {}", format_price(car.price));
    if let Some(description) = &car.description {
        println!("description: {description}");
    }
    if !car.features.is_empty() {
        println!("features: {}", car.features.join(", "));
    }
}
