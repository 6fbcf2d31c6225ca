use anyhow::Result;

fn main() -> Result<()> {
    harbor_shell::run()
}
