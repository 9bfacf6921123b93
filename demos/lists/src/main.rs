use splists::{Client, GetListItemsRequest, ListsClient, Url, XmlElement};
use std::{error::Error, fs, path::PathBuf, time::Duration};
use structopt::StructOpt;

#[derive(StructOpt)]
enum Mode {
    /// Lists every list on the site
    Collection,

    /// Shows the schema of one list
    List { name: String },

    /// Queries the items of a list
    Items {
        name: String,

        /// File holding a CAML <Query> element
        #[structopt(long, parse(from_os_str))]
        query: Option<PathBuf>,

        #[structopt(long)]
        row_limit: Option<u32>,
    },

    /// Uploads a file as an attachment of a list item
    Attach {
        name: String,
        item: String,

        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    Delete { name: String },
}

#[derive(StructOpt)]
struct Args {
    /// Address of `_vti_bin/Lists.asmx`
    #[structopt(long)]
    endpoint: Url,

    /// Per-call timeout in seconds
    #[structopt(long)]
    timeout: Option<u64>,

    #[structopt(subcommand)]
    mode: Mode,
}

fn print(element: Option<XmlElement>) -> Result<(), Box<dyn Error>> {
    match element {
        Some(element) => println!("{}", element.to_xml_string()?),
        None => println!("(no result)"),
    }

    Ok(())
}

#[paw::main]
fn main(args: Args) -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut builder = Client::builder(args.endpoint);
    if let Some(timeout) = args.timeout {
        builder = builder.timeout(Duration::from_secs(timeout));
    }

    let lists = ListsClient::new(builder.build());

    match args.mode {
        Mode::Collection => print(lists.get_list_collection()?),
        Mode::List { name } => print(lists.get_list(&name)?),

        Mode::Items {
            name,
            query,
            row_limit,
        } => {
            let mut request = GetListItemsRequest::new(name);
            request.row_limit = row_limit;
            if let Some(path) = query {
                request.query = Some(fs::read_to_string(path)?.parse()?);
            }

            print(lists.get_list_items(request)?)
        }

        Mode::Attach { name, item, file } => {
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = fs::read(&file)?;
            log::info!("uploading {} ({} bytes)", file_name, bytes.len());

            match lists.add_attachment(&name, &item, &file_name, &bytes)? {
                Some(url) => println!("{}", url),
                None => println!("(no result)"),
            }

            Ok(())
        }

        Mode::Delete { name } => {
            lists.delete_list(&name)?;
            println!("deleted {}", name);
            Ok(())
        }
    }
}
