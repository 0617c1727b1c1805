#[rocket::launch]
fn rocket() -> _ {
    leadstore_api::rocket()
}
