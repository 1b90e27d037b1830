use anyhow::Result;
use pretty_assertions::assert_eq;
use sigil::name::{ClassName, MemberKey};
use sigil::tabular;

#[test]
fn read_maps_and_write_back() -> Result<()> {
	let input = include_str!("tabular_input.remap");

	let table = tabular::read(input.as_bytes())?;
	table.check_namespaces("spigot", "mojang")?;
	assert!(table.check_namespaces("mojang", "spigot").is_err());

	let foo = ClassName::new("net/example/EntityFoo");
	let world = ClassName::new("net/example/WorldServer");

	assert_eq!(table.map_class(&foo).as_str(), "net/example/FooEntity");
	assert_eq!(table.map_class(&world).as_str(), "net/example/ServerLevel");
	assert_eq!(table.map_field(&foo, &MemberKey::new("a", "I")), "health");
	assert_eq!(table.map_field(&foo, &MemberKey::new("b", "Lnet/example/EntityFoo;")), "leader");
	assert_eq!(table.map_method(&foo, &MemberKey::new("c", "()V")), "tick");
	// same name under a different descriptor is a different member
	assert_eq!(table.map_method(&foo, &MemberKey::new("c", "(I)V")), "c");
	assert_eq!(table.map_method(&world, &MemberKey::new("a", "()Lnet/example/EntityFoo;")), "firstFoo");

	// descriptors are remapped through the class table
	assert_eq!(table.map_desc("(Lnet/example/EntityFoo;I)Lnet/example/WorldServer;"),
		"(Lnet/example/FooEntity;I)Lnet/example/ServerLevel;");

	// writing sorts, so the sorted input comes back unchanged
	assert_eq!(tabular::write_string(&table)?, input);

	Ok(())
}

#[test]
fn rejects_wrong_header() {
	assert!(tabular::read("tiny\t2\t0\ta\tb\n".as_bytes()).is_err());
	assert!(tabular::read("remap\t2\ta\tb\n".as_bytes()).is_err());
	assert!(tabular::read("".as_bytes()).is_err());
}

#[test]
fn rejects_member_line_without_class() {
	let input = "remap\t1\ta\tb\n\tf\tI\tx\ty\n";
	assert!(tabular::read(input.as_bytes()).is_err());
}
