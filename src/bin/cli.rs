use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::json;

const TOKEN_FILE: &str = ".hoteluxe_token";

#[derive(Parser)]
#[command(name = "hoteluxe-cli")]
#[command(about = "CLI for the Hoteluxe booking API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session token issued by the identity provider
    Login {
        #[arg(short, long)]
        token: String,
    },
    CheckAvailability {
        #[arg(short, long)]
        room: String,
        #[arg(long)]
        check_in: String,
        #[arg(long)]
        check_out: String,
    },
    Book {
        #[arg(short, long)]
        room: String,
        #[arg(long)]
        check_in: String,
        #[arg(long)]
        check_out: String,
        #[arg(short, long, default_value_t = 1)]
        guests: u32,
        /// Send the confirmation here instead of the account address
        #[arg(short, long)]
        email: Option<String>,
    },
    MyBookings,
    /// Start checkout for one of your bookings
    Pay {
        #[arg(short, long)]
        booking: String,
        /// Origin the checkout redirects back to
        #[arg(long, default_value = "http://localhost:5173")]
        origin: String,
    },
    Dashboard,
    Rooms,
    OwnerRooms,
    RegisterHotel {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        address: String,
        #[arg(short, long)]
        contact: String,
        #[arg(long)]
        city: String,
    },
    AddRoom {
        #[arg(short = 't', long)]
        room_type: String,
        #[arg(short, long)]
        price: f64,
        #[arg(short, long, value_delimiter = ',')]
        amenities: Vec<String>,
        #[arg(short, long)]
        image: Vec<PathBuf>,
    },
    ToggleRoom {
        #[arg(short, long)]
        room: String,
    },
    Me,
    RecentSearch {
        #[arg(short, long)]
        city: String,
    },
    Logout,
}

fn authorized(request: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    request.bearer_auth(token.trim())
}

async fn print_response(request: RequestBuilder) -> anyhow::Result<()> {
    let res = request.send().await?;
    println!("{} {}", res.status(), res.text().await?);
    Ok(())
}

async fn room_form(room_type: String, price: f64, amenities: Vec<String>, images: Vec<PathBuf>) -> anyhow::Result<Form> {
    let mut form = Form::new()
        .text("roomType", room_type)
        .text("pricePerNight", price.to_string())
        .text("amenities", serde_json::to_string(&amenities)?);
    for path in images {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        form = form.part("images", Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = |path: &str| format!("{}{}", cli.url.trim_end_matches('/'), path);

    match cli.command {
        Commands::Login { token } => {
            fs::write(TOKEN_FILE, token)?;
            println!("Token saved to {TOKEN_FILE}");
        }
        Commands::CheckAvailability { room, check_in, check_out } => {
            let request = client
                .post(url("/api/bookings/check-availability"))
                .json(&json!({ "room": room, "checkInDate": check_in, "checkOutDate": check_out }));
            print_response(request).await?;
        }
        Commands::Book { room, check_in, check_out, guests, email } => {
            let request = client.post(url("/api/bookings/book")).json(&json!({
                "room": room,
                "checkInDate": check_in,
                "checkOutDate": check_out,
                "guests": guests,
                "email": email,
            }));
            print_response(authorized(request)).await?;
        }
        Commands::MyBookings => {
            print_response(authorized(client.get(url("/api/bookings/user")))).await?;
        }
        Commands::Pay { booking, origin } => {
            let request = client
                .post(url("/api/bookings/stripe-payment"))
                .header(reqwest::header::ORIGIN, origin)
                .json(&json!({ "bookingId": booking }));
            print_response(authorized(request)).await?;
        }
        Commands::Dashboard => {
            print_response(authorized(client.get(url("/api/bookings/hotel")))).await?;
        }
        Commands::Rooms => {
            print_response(client.get(url("/api/rooms"))).await?;
        }
        Commands::OwnerRooms => {
            print_response(authorized(client.get(url("/api/rooms/owner")))).await?;
        }
        Commands::RegisterHotel { name, address, contact, city } => {
            let request = client
                .post(url("/api/hotels"))
                .json(&json!({ "name": name, "address": address, "contact": contact, "city": city }));
            print_response(authorized(request)).await?;
        }
        Commands::AddRoom { room_type, price, amenities, image } => {
            let form = room_form(room_type, price, amenities, image).await?;
            print_response(authorized(client.post(url("/api/rooms")).multipart(form))).await?;
        }
        Commands::ToggleRoom { room } => {
            let request = client
                .post(url("/api/rooms/toggle-availability"))
                .json(&json!({ "roomId": room }));
            print_response(authorized(request)).await?;
        }
        Commands::Me => {
            print_response(authorized(client.get(url("/api/user")))).await?;
        }
        Commands::RecentSearch { city } => {
            let request = client
                .post(url("/api/user/store-recent-search"))
                .json(&json!({ "recentSearchedCity": city }));
            print_response(authorized(request)).await?;
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
    }

    Ok(())
}
