fn main() {
    // option_env!() values are baked in at compile time; rebuild when they change.
    println!("cargo:rerun-if-env-changed=SUPABASE_URL");
    println!("cargo:rerun-if-env-changed=SUPABASE_PUBLISHABLE_KEY");
    println!("cargo:rerun-if-env-changed=TODO_FEED_WEB_APP_URL");
}
